// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-sent event streams for occupancy and own bookings.

use axum::body::Body;
use axum::http::{Response, StatusCode};
use futures_util::StreamExt;
use serde_json::json;
use std::time::Duration;

mod common;
use common::create_test_app;

/// Read SSE frames until one with a `data:` line arrives; return its JSON.
async fn next_data(stream: &mut axum::body::BodyDataStream) -> serde_json::Value {
    let mut buffer = String::new();
    loop {
        let chunk = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("stream error");
        buffer.push_str(std::str::from_utf8(&chunk).unwrap());

        while let Some(end) = buffer.find("\n\n") {
            let frame: String = buffer.drain(..end + 2).collect();
            if let Some(data) = frame.lines().find_map(|l| l.strip_prefix("data:")) {
                return serde_json::from_str(data.trim()).unwrap();
            }
        }
    }
}

fn data_stream(response: Response<Body>) -> axum::body::BodyDataStream {
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    response.into_body().into_data_stream()
}

#[tokio::test]
async fn test_occupancy_stream_follows_bookings() {
    let app = create_test_app();
    let viewer = app.client_token("viewer");
    let booker = app.client_token("booker");

    let response = app
        .send(
            "GET",
            "/api/availability/stream?from=2025-03-01&to=2025-03-31",
            Some(&viewer),
            None,
        )
        .await;
    let mut stream = data_stream(response);

    assert_eq!(next_data(&mut stream).await, json!({}));

    let created = common::json_body(
        app.send(
            "POST",
            "/api/bookings",
            Some(&booker),
            Some(json!({ "date": "2025-03-14", "slotId": "afternoon" })),
        )
        .await,
    )
    .await;

    let update = next_data(&mut stream).await;
    assert_eq!(
        update,
        json!({ "2025-03-14": { "morning": false, "afternoon": true } })
    );

    app.send(
        "DELETE",
        &format!("/api/bookings/{}", created["id"].as_str().unwrap()),
        Some(&booker),
        None,
    )
    .await;
    assert_eq!(next_data(&mut stream).await, json!({}));
}

#[tokio::test]
async fn test_own_bookings_stream() {
    let app = create_test_app();
    let token = app.client_token("pat");

    let response = app.send("GET", "/api/bookings/stream", Some(&token), None).await;
    let mut stream = data_stream(response);
    assert_eq!(next_data(&mut stream).await, json!([]));

    app.send(
        "POST",
        "/api/bookings",
        Some(&token),
        Some(json!({ "date": "2025-07-01", "slotId": "morning" })),
    )
    .await;

    let list = next_data(&mut stream).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["userId"], "pat");
    assert_eq!(list[0]["slotId"], "morning");
}

#[tokio::test]
async fn test_profile_stream_picks_up_admin_quota_edit() {
    let app = create_test_app();
    let token = app.client_token("quinn");

    let response = app.send("GET", "/api/me/stream", Some(&token), None).await;
    let mut stream = data_stream(response);

    let initial = next_data(&mut stream).await;
    assert_eq!(initial["uid"], "quinn");
    assert_eq!(initial["maxBookingsPerMonth"], 2);

    let saved = app
        .send(
            "POST",
            "/api/admin/clients",
            Some(&app.admin_token()),
            Some(json!({
                "email": "quinn@example.com",
                "displayName": "Quinn",
                "maxBookingsPerMonth": 5
            })),
        )
        .await;
    assert!(saved.status().is_success());

    // The next page load syncs the record into the profile.
    app.send("GET", "/api/me", Some(&token), None).await;

    let updated = next_data(&mut stream).await;
    assert_eq!(updated["maxBookingsPerMonth"], 5);
    assert_eq!(updated["displayName"], "Quinn");
}

#[tokio::test]
async fn test_overrides_stream_follows_admin_toggles() {
    let app = create_test_app();
    let token = app.client_token("rae");

    let response = app
        .send("GET", "/api/calendar/overrides/stream", Some(&token), None)
        .await;
    let mut stream = data_stream(response);

    let initial = next_data(&mut stream).await;
    assert_eq!(initial["disabledDates"], json!([]));

    let toggled = app
        .send(
            "PUT",
            "/api/admin/overrides/dates/2025-12-25",
            Some(&app.admin_token()),
            Some(json!({ "disabled": true })),
        )
        .await;
    assert_eq!(toggled.status(), StatusCode::OK);

    let updated = next_data(&mut stream).await;
    assert_eq!(updated["disabledDates"], json!(["2025-12-25"]));
}
