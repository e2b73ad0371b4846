use chamapay::handlers::callback::CallbackEnvelope;
use chamapay::services::reconcile::{receipt_number, settlement_amount};
use serde_json::json;
use sqlx::types::BigDecimal;

fn success_envelope() -> serde_json::Value {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        { "Name": "Amount", "Value": 1000.0 },
                        { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                        { "Name": "TransactionDate", "Value": 20191219102115u64 },
                        { "Name": "PhoneNumber", "Value": 254712345678u64 }
                    ]
                }
            }
        }
    })
}

#[test]
fn parses_success_envelope() {
    let envelope: CallbackEnvelope = serde_json::from_value(success_envelope()).unwrap();
    let callback = envelope.body.stk_callback;

    assert_eq!(callback.checkout_request_id, "ws_CO_191220191020363925");
    assert_eq!(callback.result_code, 0);

    let items = callback.metadata.unwrap().items;
    assert_eq!(receipt_number(&items).as_deref(), Some("NLJ7RT61SV"));
    assert_eq!(settlement_amount(&items), Some(BigDecimal::from(1000)));
}

#[test]
fn parses_failure_envelope_without_metadata() {
    let envelope: CallbackEnvelope = serde_json::from_value(json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user."
            }
        }
    }))
    .unwrap();
    let callback = envelope.body.stk_callback;

    assert_eq!(callback.result_code, 1032);
    assert_eq!(callback.result_desc, "Request cancelled by user.");
    assert!(callback.metadata.is_none());
}

#[test]
fn rejects_envelope_without_stk_callback() {
    let result = serde_json::from_value::<CallbackEnvelope>(json!({ "Body": {} }));
    assert!(result.is_err());
}

#[test]
fn unknown_metadata_items_are_tolerated() {
    let envelope: CallbackEnvelope = serde_json::from_value(json!({
        "Body": {
            "stkCallback": {
                "CheckoutRequestID": "ws_CO_1",
                "ResultCode": 0,
                "ResultDesc": "ok",
                "CallbackMetadata": {
                    "Item": [
                        { "Name": "Balance" },
                        { "Name": "SomethingNew", "Value": {"nested": true} }
                    ]
                }
            }
        }
    }))
    .unwrap();

    let items = envelope.body.stk_callback.metadata.unwrap().items;
    assert_eq!(receipt_number(&items), None);
    assert_eq!(settlement_amount(&items), None);
}

#[test]
fn acknowledgement_payload_shape() {
    // The shape the gateway requires from every invocation of the
    // callback route, regardless of branch taken.
    let ack = json!({ "ResultCode": 0, "ResultDesc": "Accepted" });
    assert_eq!(ack["ResultCode"], 0);
    assert_eq!(ack["ResultDesc"], "Accepted");
}
