//! Normalize a fault plan and report every magnitude that had to be clamped.
//!
//! Usage: cargo run --bin fault_plan -- [path]
//!
//! Stdout is JSON lines only; the result is the record with event `summary`.
//!
//! Exit codes: 0 ok, 1 load failure, 2 coercions under FAULT_STRICT,
//! 3 write failure.

use faultmodel::config::Config;
use faultmodel::logging::{log, obj, v_str, Domain, Level};
use faultmodel::FaultPlan;
use serde_json::{json, Value};
use std::env;
use std::path::PathBuf;

fn main() {
    let cfg = Config::from_env();
    let path = env::args().nth(1).unwrap_or_else(|| cfg.plan_path.clone());
    log(
        Level::Debug,
        Domain::Config,
        "resolved",
        obj(&[
            ("plan_path", v_str(&path)),
            ("plan_out", cfg.plan_out.as_deref().map(v_str).unwrap_or(Value::Null)),
            ("strict", json!(cfg.strict)),
        ]),
    );

    let loaded = match FaultPlan::load(PathBuf::from(&path).as_path()) {
        Ok(l) => l,
        Err(err) => {
            log(
                Level::Error,
                Domain::Plan,
                "load_failed",
                obj(&[("path", v_str(&path)), ("msg", v_str(&format!("{:#}", err)))]),
            );
            eprintln!("failed to load {}: {:#}", path, err);
            std::process::exit(1);
        }
    };

    log(
        Level::Info,
        Domain::Plan,
        "summary",
        obj(&[
            ("path", v_str(&path)),
            ("endpoints", json!(loaded.plan.endpoint_count())),
            ("services", json!(loaded.plan.service_count())),
            ("coercions", json!(loaded.coercions)),
            ("fingerprint", v_str(&loaded.plan.fingerprint())),
        ]),
    );

    if cfg.strict && !loaded.is_clean() {
        eprintln!("{} value(s) coerced with FAULT_STRICT set", loaded.coercions.len());
        std::process::exit(2);
    }

    if let Some(out) = cfg.plan_out.as_deref() {
        if let Err(err) = loaded.plan.save(PathBuf::from(out).as_path()) {
            eprintln!("failed to write {}: {:#}", out, err);
            std::process::exit(3);
        }
    }

    log(Level::Info, Domain::System, "done", obj(&[("path", v_str(&path))]));
}
