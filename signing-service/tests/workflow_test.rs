//! End-to-end workflow transitions over the HTTP surface.

mod common;

use common::{request_body, sequential_request_body, signer_ids, spawn_app};
use serde_json::json;

#[tokio::test]
async fn sequential_request_enforces_order_and_completes() {
    let Some(app) = spawn_app().await else { return };

    let request = app.create_request_ok(sequential_request_body(3)).await;
    let request_id = request["request_id"].as_str().unwrap();
    let signers = signer_ids(&request);
    assert_eq!(request["status"], "pending");

    // Signer 2 cannot act before signer 1.
    let response = app
        .submit_action(request_id, &signers[1], json!({ "action": "sign" }))
        .await;
    assert_eq!(response.status().as_u16(), 422);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("OUT_OF_ORDER"));

    // In order, each signature is accepted; the last one completes.
    for (i, signer_id) in signers.iter().enumerate() {
        let response = app
            .submit_action(request_id, signer_id, json!({ "action": "sign" }))
            .await;
        assert_eq!(response.status().as_u16(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        if i + 1 == signers.len() {
            assert_eq!(body["outcome"], "completed");
            assert_eq!(body["request_status"], "completed");
        } else {
            assert_eq!(body["outcome"], "signed");
        }
    }

    let request = app.get_request(request_id).await;
    assert_eq!(request["status"], "completed");
    assert!(request["completed_utc"].is_string());
    assert!(request["declined_utc"].is_null());
}

#[tokio::test]
async fn parallel_request_accepts_any_order() {
    let Some(app) = spawn_app().await else { return };

    let request = app
        .create_request_ok(request_body("parallel", 3, false))
        .await;
    let request_id = request["request_id"].as_str().unwrap();
    let signers = signer_ids(&request);

    // Last-listed signer first: no ordering in parallel mode.
    for signer_id in signers.iter().rev() {
        let response = app
            .submit_action(request_id, signer_id, json!({ "action": "sign" }))
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    let request = app.get_request(request_id).await;
    assert_eq!(request["status"], "completed");
}

#[tokio::test]
async fn concurrent_final_signatures_complete_the_request_exactly_once() {
    let Some(app) = spawn_app().await else { return };

    let request = app
        .create_request_ok(request_body("parallel", 2, false))
        .await;
    let request_id = request["request_id"].as_str().unwrap();
    let signers = signer_ids(&request);

    // Both remaining signers race; the row lock serializes them, so each
    // signature lands and exactly one observes the completion.
    let (first, second) = tokio::join!(
        app.submit_action(request_id, &signers[0], json!({ "action": "sign" })),
        app.submit_action(request_id, &signers[1], json!({ "action": "sign" })),
    );
    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(second.status().as_u16(), 200);

    let first: serde_json::Value = first.json().await.unwrap();
    let second: serde_json::Value = second.json().await.unwrap();
    let completions = [&first, &second]
        .iter()
        .filter(|body| body["outcome"] == "completed")
        .count();
    assert_eq!(completions, 1);

    let request = app.get_request(request_id).await;
    assert_eq!(request["status"], "completed");
    assert!(request["completed_utc"].is_string());
}

#[tokio::test]
async fn concurrent_out_of_order_signature_cannot_slip_past_the_lock() {
    let Some(app) = spawn_app().await else { return };

    let request = app.create_request_ok(sequential_request_body(2)).await;
    let request_id = request["request_id"].as_str().unwrap();
    let signers = signer_ids(&request);

    // Signer 2 races signer 1. Whichever transaction wins the lock, signer 2
    // either re-evaluates against signer 1's committed signature (accepted)
    // or is rejected as out of order; a lost update is never possible.
    let (first, second) = tokio::join!(
        app.submit_action(request_id, &signers[0], json!({ "action": "sign" })),
        app.submit_action(request_id, &signers[1], json!({ "action": "sign" })),
    );
    assert_eq!(first.status().as_u16(), 200);
    let second_status = second.status().as_u16();
    assert!(
        second_status == 200 || second_status == 422,
        "unexpected status {second_status}"
    );

    let request = app.get_request(request_id).await;
    if second_status == 200 {
        assert_eq!(request["status"], "completed");
        assert!(request["completed_utc"].is_string());
    } else {
        let body: serde_json::Value = second.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("OUT_OF_ORDER"));
        assert_eq!(request["status"], "in_progress");
        let signed = request["signers"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|s| s["status"] == "signed")
            .count();
        assert_eq!(signed, 1);
    }
}

#[tokio::test]
async fn decline_terminates_request_and_cascades() {
    let Some(app) = spawn_app().await else { return };

    let request = app.create_request_ok(sequential_request_body(3)).await;
    let request_id = request["request_id"].as_str().unwrap();
    let signers = signer_ids(&request);

    let response = app
        .submit_action(request_id, &signers[0], json!({ "action": "sign" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .submit_action(
            request_id,
            &signers[1],
            json!({ "action": "decline", "reason": "terms unacceptable" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["outcome"], "declined");
    assert_eq!(body["request_status"], "declined");
    // Only the not-yet-terminal signer is cascaded.
    assert_eq!(
        body["affected_signer_ids"],
        serde_json::json!([signers[2]])
    );

    let request = app.get_request(request_id).await;
    assert_eq!(request["status"], "declined");
    assert_eq!(request["decline_reason"], "terms unacceptable");
    assert!(request["declined_utc"].is_string());
    assert!(request["completed_utc"].is_null());

    let by_id = |id: &str| {
        request["signers"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["signer_id"] == *id)
            .unwrap()
            .clone()
    };
    // The earlier signature is preserved.
    assert_eq!(by_id(&signers[0])["status"], "signed");
    assert_eq!(by_id(&signers[1])["status"], "declined");
    let cascaded = by_id(&signers[2]);
    assert_eq!(cascaded["status"], "declined");
    assert!(cascaded["decline_reason"]
        .as_str()
        .unwrap()
        .starts_with("automatically declined"));

    // Terminal requests admit no further actions.
    let response = app
        .submit_action(request_id, &signers[2], json!({ "action": "sign" }))
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn view_is_idempotent_and_moves_request_in_progress() {
    let Some(app) = spawn_app().await else { return };

    let request = app
        .create_request_ok(request_body("parallel", 2, false))
        .await;
    let request_id = request["request_id"].as_str().unwrap();
    let signers = signer_ids(&request);

    let response = app
        .submit_action(request_id, &signers[0], json!({ "action": "view" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["outcome"], "viewed");
    assert_eq!(body["request_status"], "in_progress");

    let response = app
        .submit_action(request_id, &signers[0], json!({ "action": "view" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["outcome"], "already_viewed");
}

#[tokio::test]
async fn second_factor_gates_signing() {
    let Some(app) = spawn_app().await else { return };

    let request = app
        .create_request_ok(request_body("parallel", 1, true))
        .await;
    let request_id = request["request_id"].as_str().unwrap();
    let signers = signer_ids(&request);

    // No code at all.
    let response = app
        .submit_action(request_id, &signers[0], json!({ "action": "sign" }))
        .await;
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("SECOND_FACTOR_REQUIRED"));

    // A code with no enrolled credential behind it.
    let response = app
        .submit_action(
            request_id,
            &signers[0],
            json!({ "action": "sign", "code": "123456" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("SECOND_FACTOR_INVALID"));

    // The failed attempts changed nothing.
    let request = app.get_request(request_id).await;
    assert_eq!(request["signers"][0]["status"], "pending");
}

#[tokio::test]
async fn valid_totp_code_clears_the_gate() {
    use base64::Engine;
    use signing_service::models::SecondFactorCredential;
    use signing_service::services::second_factor::totp;

    let Some(app) = spawn_app().await else { return };

    let request = app
        .create_request_ok(request_body("parallel", 1, true))
        .await;
    let request_id = request["request_id"].as_str().unwrap();
    let signers = signer_ids(&request);

    let secret = b"integration-test-secret";
    app.db
        .insert_credential(&SecondFactorCredential {
            credential_id: uuid::Uuid::new_v4(),
            email: "signer1@example.com".to_string(),
            totp_secret: base64::engine::general_purpose::STANDARD.encode(secret),
            created_utc: chrono::Utc::now(),
        })
        .await
        .unwrap();

    let code = totp::code_at(secret, chrono::Utc::now().timestamp(), 0);
    let response = app
        .submit_action(
            request_id,
            &signers[0],
            json!({ "action": "sign", "code": code }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["outcome"], "completed");

    // Verified-by-code is recorded on the signer.
    let request = app.get_request(request_id).await;
    assert!(request["signers"][0]["second_factor_verified_utc"].is_string());
}

#[tokio::test]
async fn backup_code_clears_the_gate_once() {
    use base64::Engine;
    use signing_service::models::{BackupCode, SecondFactorCredential};
    use signing_service::services::second_factor::{
        generate_backup_code, hash_backup_code, SecondFactorGate,
    };

    let Some(app) = spawn_app().await else { return };

    let request = app
        .create_request_ok(request_body("parallel", 1, true))
        .await;
    let request_id = request["request_id"].as_str().unwrap();
    let signers = signer_ids(&request);

    let credential_id = uuid::Uuid::new_v4();
    app.db
        .insert_credential(&SecondFactorCredential {
            credential_id,
            email: "signer1@example.com".to_string(),
            totp_secret: base64::engine::general_purpose::STANDARD.encode(b"backup-test-secret"),
            created_utc: chrono::Utc::now(),
        })
        .await
        .unwrap();
    let backup_code = generate_backup_code();
    app.db
        .insert_backup_code(&BackupCode {
            code_id: uuid::Uuid::new_v4(),
            credential_id,
            code_hash: hash_backup_code(&backup_code),
            used_utc: None,
            created_utc: chrono::Utc::now(),
        })
        .await
        .unwrap();

    let response = app
        .submit_action(
            request_id,
            &signers[0],
            json!({ "action": "sign", "code": backup_code }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    // Consumed with the transition; the same code never validates again.
    let gate = SecondFactorGate::new(app.db.clone());
    let outcome = gate
        .verify("signer1@example.com", &backup_code, chrono::Utc::now())
        .await
        .unwrap();
    assert!(!outcome.ok);
}

#[tokio::test]
async fn draft_requests_are_invisible_until_sent() {
    let Some(app) = spawn_app().await else { return };

    let mut body = request_body("parallel", 1, false);
    body["send_immediately"] = json!(false);
    let request = app.create_request_ok(body).await;
    let request_id = request["request_id"].as_str().unwrap().to_string();
    let signers = signer_ids(&request);
    assert_eq!(request["status"], "draft");

    // Signers cannot act on (or detect) a draft.
    let response = app
        .submit_action(&request_id, &signers[0], json!({ "action": "view" }))
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app
        .client
        .post(format!("{}/requests/{request_id}/send", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let sent: serde_json::Value = response.json().await.unwrap();
    assert_eq!(sent["status"], "pending");

    // Sending twice conflicts.
    let response = app
        .client
        .post(format!("{}/requests/{request_id}/send", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let response = app
        .submit_action(&request_id, &signers[0], json!({ "action": "view" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn completion_sends_one_notification_per_recipient() {
    let Some(app) = spawn_app().await else { return };

    let request = app
        .create_request_ok(request_body("parallel", 2, false))
        .await;
    let request_id = request["request_id"].as_str().unwrap();
    let signers = signer_ids(&request);

    for signer_id in &signers {
        let response = app
            .submit_action(request_id, signer_id, json!({ "action": "sign" }))
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    // Owner plus both signers, exactly once each.
    let delivered = app
        .wait_for_notifications(request_id, 3, |l| {
            l["notification_type"] == "request_completed" && l["status"] == "delivered"
        })
        .await;
    assert_eq!(delivered.len(), 3);
    let mut recipients: Vec<&str> = delivered
        .iter()
        .map(|l| l["recipient"].as_str().unwrap())
        .collect();
    recipients.sort();
    assert_eq!(
        recipients,
        vec![
            "owner@example.com",
            "signer1@example.com",
            "signer2@example.com"
        ]
    );
}

#[tokio::test]
async fn create_request_validates_payload() {
    let Some(app) = spawn_app().await else { return };

    // No signers.
    let mut body = request_body("parallel", 0, false);
    body["signers"] = json!([]);
    let response = app.create_request(body).await;
    assert_eq!(response.status().as_u16(), 422);

    // Bad email.
    let mut body = request_body("parallel", 1, false);
    body["signers"][0]["email"] = json!("not-an-email");
    let response = app.create_request(body).await;
    assert_eq!(response.status().as_u16(), 422);

    // Duplicate signers.
    let mut body = request_body("parallel", 2, false);
    body["signers"][1]["email"] = json!("signer1@example.com");
    let response = app.create_request(body).await;
    assert_eq!(response.status().as_u16(), 400);

    // Expiry in the past.
    let mut body = request_body("parallel", 1, false);
    body["expires_utc"] = json!(chrono::Utc::now() - chrono::Duration::hours(1));
    let response = app.create_request(body).await;
    assert_eq!(response.status().as_u16(), 400);
}
