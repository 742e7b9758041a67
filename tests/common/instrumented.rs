//! Instrumented demo functions
//!
//! Small functions that report through `observe_return` the way production
//! code under instrumentation would. The suite records and replays these.

use calltape::{observe_return, CallArgs, CallSite, CapturedCall, Signature};
use chrono::{DateTime, Utc};

pub fn convert(amount: i64, rate: i64) -> i64 {
    let result = amount * rate;
    observe_return(&CallSite::new("convert"), move |codec| {
        Ok(CapturedCall::new(
            Signature::new().param("amount").param("rate"),
            CallArgs::new().pos(amount).pos(rate),
            codec.encode(&result)?,
        ))
    });
    result
}

pub fn greet(name: &str) -> String {
    let result = format!("hello {name}");
    let reported = result.clone();
    let name = name.to_string();
    observe_return(&CallSite::new("greet"), move |codec| {
        Ok(CapturedCall::new(
            Signature::new().param("name"),
            CallArgs::new().pos(name.as_str()),
            codec.encode(&reported)?,
        ))
    });
    result
}

pub fn schedule(when: DateTime<Utc>) -> &'static str {
    let result = "booked";
    observe_return(&CallSite::new("schedule"), move |codec| {
        Ok(CapturedCall::new(
            Signature::new().param("when"),
            CallArgs::new().pos(when),
            codec.encode(&result)?,
        ))
    });
    result
}

/// Method-style callee: the recording convention passes the receiver
/// alongside the arguments, and the key must not depend on it.
pub struct Ledger {
    pub currency: &'static str,
}

impl Ledger {
    pub fn total(&self, amount: i64, fee: i64) -> i64 {
        let result = amount + fee;
        let currency = self.currency;
        observe_return(&CallSite::new("total"), move |codec| {
            Ok(CapturedCall::new(
                Signature::new()
                    .param("amount")
                    .param("fee")
                    .with_receiver("self"),
                CallArgs::new().pos(amount).pos(fee).with_receiver(currency),
                codec.encode(&result)?,
            ))
        });
        result
    }
}
