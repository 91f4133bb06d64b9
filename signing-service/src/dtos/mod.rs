pub mod requests;
pub mod responses;

pub use requests::{
    CreateSigningRequestDto, GrantExemptionDto, RevokeExemptionDto, SignerInputDto,
    SubmitActionDto,
};
pub use responses::{
    ExemptionResponse, NotificationLogResponse, SignerResponse, SigningRequestResponse,
    TransitionResponse,
};
