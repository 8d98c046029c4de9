//! Hand-written `prost` message types covering exactly the wire shape §4.I
//! names. No `.proto` file or `build.rs`/`protoc` step: these structs are
//! written directly against `prost::Message`/`prost::Oneof`, the supported
//! "skip codegen" path the crate documents for exactly this situation —
//! a small, fixed schema that doesn't need a build-time compiler. Field
//! numbers below are this schema's own; there is no external `.proto` they
//! must match.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, prost::Message)]
pub struct TraceStart {
    #[prost(string, tag = "1")]
    pub executable_path: String,
    #[prost(string, repeated, tag = "2")]
    pub args: Vec<String>,
    #[prost(string, tag = "3")]
    pub operating_system: String,
    #[prost(string, tag = "4")]
    pub cpu_architecture: String,
}

#[derive(Debug, Clone, PartialEq, prost::Message)]
pub struct TraceEnd {
    #[prost(int32, tag = "1")]
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq, prost::Message)]
pub struct FunctionCall {
    #[prost(string, tag = "1")]
    pub symbol: String,
    #[prost(uint64, tag = "2")]
    pub address: u64,
    #[prost(map = "string, uint64", tag = "3")]
    pub argument_registers: HashMap<String, u64>,
    #[prost(bytes = "vec", tag = "4")]
    pub stack_shallow_copy: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, prost::Message)]
pub struct FunctionReturn {
    #[prost(string, tag = "1")]
    pub symbol: String,
    #[prost(uint64, tag = "2")]
    pub address: u64,
    #[prost(map = "string, uint64", tag = "3")]
    pub return_registers: HashMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, prost::Message)]
pub struct SignalDelivery {
    #[prost(int32, tag = "1")]
    pub number: i32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(map = "string, uint64", tag = "3")]
    pub registers: HashMap<String, u64>,
}

pub mod event {
    #[derive(Debug, Clone, PartialEq, prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "4")]
        TraceStart(super::TraceStart),
        #[prost(message, tag = "5")]
        TraceEnd(super::TraceEnd),
        #[prost(message, tag = "6")]
        FunctionCall(super::FunctionCall),
        #[prost(message, tag = "7")]
        FunctionReturn(super::FunctionReturn),
        #[prost(message, tag = "8")]
        SignalDelivery(super::SignalDelivery),
    }
}

#[derive(Debug, Clone, PartialEq, prost::Message)]
pub struct Event {
    #[prost(uint64, tag = "1")]
    pub event_id: u64,
    #[prost(int32, tag = "2")]
    pub thread_id: i32,
    #[prost(message, tag = "3")]
    pub timestamp: Option<prost_types::Timestamp>,
    #[prost(oneof = "event::Payload", tags = "4, 5, 6, 7, 8")]
    pub payload: Option<event::Payload>,
}

/// Splits a nanosecond timestamp into the `{seconds, nanos}` pair
/// `google.protobuf.Timestamp` expects.
pub fn timestamp_from_ns(timestamp_ns: u64) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: (timestamp_ns / 1_000_000_000) as i64,
        nanos: (timestamp_ns % 1_000_000_000) as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn function_call_round_trips_through_encode_decode() {
        let call = Event {
            event_id: 42,
            thread_id: 7,
            timestamp: Some(timestamp_from_ns(1_500_000_001)),
            payload: Some(event::Payload::FunctionCall(FunctionCall {
                symbol: "fn_0_3".to_string(),
                address: 0x1234,
                argument_registers: HashMap::from([("r0".to_string(), 9u64)]),
                stack_shallow_copy: vec![1, 2, 3],
            })),
        };
        let mut buf = Vec::new();
        call.encode(&mut buf).unwrap();
        let decoded = Event::decode(buf.as_slice()).unwrap();
        assert_eq!(decoded.event_id, 42);
        match decoded.payload {
            Some(event::Payload::FunctionCall(fc)) => {
                assert_eq!(fc.symbol, "fn_0_3");
                assert_eq!(fc.address, 0x1234);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn default_fields_are_omitted_from_the_wire() {
        let call = TraceEnd { exit_code: 0 };
        let mut buf = Vec::new();
        call.encode(&mut buf).unwrap();
        assert!(buf.is_empty(), "a default-valued scalar field must not appear on the wire");
    }
}
