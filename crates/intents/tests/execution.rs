use std::time::Duration;

use serde_json::{json, Value};

use sb_intents::{
    execute_call, FnMiddleware, Intent, IntentCall, IntentError, IntentRegistry, LoggingMiddleware,
    MiddlewareChain, ParamShape, ParamType, RateLimitMiddleware,
};

fn booking_change() -> Intent {
    Intent::from_fn(
        "booking-change",
        ParamShape::new()
            .required("bookingRef", ParamType::String, "Booking reference")
            .optional("confirm", ParamType::Boolean, "Apply the change"),
        |args| async move {
            Ok(json!({
                "bookingRef": args["bookingRef"],
                "confirm": args.get("confirm").cloned().unwrap_or(Value::Null),
            }))
        },
    )
    .with_description("Change a booking.")
}

fn call<'a>(name: &'a str, raw: &'a str) -> IntentCall<'a> {
    IntentCall {
        session_id: "s1",
        user_message: "change my booking",
        function_name: name,
        raw_arguments: raw,
        previous_results: &[],
    }
}

#[tokio::test]
async fn middleware_rewrites_parameters_before_the_handler() {
    let mut reg = IntentRegistry::new();
    reg.register(booking_change());
    let state = reg.execution_state(None);

    let mut chain = MiddlewareChain::new();
    chain.add(LoggingMiddleware);
    chain.add(
        FnMiddleware::new("normalize_ref", |ctx, next| {
            Box::pin(async move {
                if let Some(Value::String(r)) = ctx.parameters.get_mut("bookingRef") {
                    *r = r.to_uppercase();
                }
                next.run(ctx).await
            })
        })
        .for_intents(["booking-change"]),
    );

    let out = execute_call(
        &state,
        &chain,
        call("booking-change", r#"{"bookingRef":"ab12","confirm":"yes","extra":1}"#),
    )
    .await
    .unwrap();

    assert_eq!(out, json!({"bookingRef": "AB12", "confirm": true}));
}

#[tokio::test]
async fn rate_limit_rejects_after_the_window_fills() {
    let mut reg = IntentRegistry::new();
    reg.register(booking_change());
    let state = reg.execution_state(None);

    let mut chain = MiddlewareChain::new();
    chain.add(RateLimitMiddleware::new(1, Duration::from_secs(60)));

    let raw = r#"{"bookingRef":"AB12"}"#;
    execute_call(&state, &chain, call("booking-change", raw))
        .await
        .unwrap();
    let err = execute_call(&state, &chain, call("booking-change", raw))
        .await
        .unwrap_err();

    assert!(matches!(err, IntentError::Rejected { ref middleware, .. } if middleware == "rate_limit"));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn inconsistent_response_is_fatal() {
    let mut reg = IntentRegistry::new();
    reg.register(Intent::from_fn(
        "booking-lookup",
        ParamShape::new().required("bookingRef", ParamType::String, ""),
        |_| async { Ok(json!([{"bookingRef": "AB12"}, {"bookingRef": "ZZ99"}])) },
    ));
    let state = reg.execution_state(None);

    let err = execute_call(
        &state,
        &MiddlewareChain::new(),
        call("booking-lookup", r#"{"bookingRef":"AB12"}"#),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "INVALID_RESPONSE");
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn unknown_intent_lists_the_callable_set() {
    let mut reg = IntentRegistry::new();
    reg.register(booking_change());
    let state = reg.execution_state(None);

    let err = execute_call(&state, &MiddlewareChain::new(), call("refund", "{}"))
        .await
        .unwrap_err();
    assert!(err.is_recoverable());

    let payload = err.to_payload("refund", state.available_names());
    assert_eq!(payload["error"]["code"], "TOOL_NOT_FOUND");
    assert_eq!(payload["error"]["availableTools"], json!(["booking-change"]));
}

#[test]
fn schema_hash_tracks_every_shape_input() {
    let base = sb_intents::schema_hash(&booking_change());

    let described = booking_change().with_description("Now with refunds.");
    assert_ne!(sb_intents::schema_hash(&described), base);

    let reshaped = Intent::from_fn(
        "booking-change",
        ParamShape::new()
            .required("bookingRef", ParamType::String, "Booking reference")
            .required("confirm", ParamType::Boolean, "Apply the change"),
        |_| async { Ok(Value::Null) },
    )
    .with_description("Change a booking.");
    assert_ne!(sb_intents::schema_hash(&reshaped), base);

    assert_eq!(sb_intents::schema_hash(&booking_change()), base);
}
