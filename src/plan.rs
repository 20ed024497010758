//! Fault plans: endpoint and service faults keyed by id, loaded from JSON.
//!
//! Loading never rejects a fault for its magnitude. Each value that had to be
//! clamped is reported as a [`Coercion`] and logged at warn level, so the
//! caller learns about the mismatch the fault types themselves stay silent on.

use anyhow::{anyhow, Context, Result};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;

use crate::fault::clamp::was_coerced;
use crate::fault::{EndpointFault, EndpointFaultInput, ServiceFault, ServiceFaultInput};
use crate::logging::{log, log_coercion, log_plan_loaded, obj, v_str, Domain, Level};

/// A requested magnitude that was stored as a different value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coercion {
    pub target: String,
    pub field: &'static str,
    pub requested: f64,
    pub stored: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PlanInput {
    #[serde(deserialize_with = "unique_ids")]
    endpoints: BTreeMap<String, EndpointFaultInput>,
    #[serde(deserialize_with = "unique_ids")]
    services: BTreeMap<String, ServiceFaultInput>,
}

/// Id-keyed map that fails on a repeated id instead of keeping the last entry.
fn unique_ids<'de, D, V>(de: D) -> std::result::Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct UniqueIds<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueIds<V> {
        type Value = BTreeMap<String, V>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of unique ids")
        }

        fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = BTreeMap::new();
            while let Some((id, value)) = access.next_entry::<String, V>()? {
                if out.contains_key(&id) {
                    return Err(de::Error::custom(format!("duplicate id {:?}", id)));
                }
                out.insert(id, value);
            }
            Ok(out)
        }
    }

    de.deserialize_map(UniqueIds(PhantomData))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FaultPlan {
    endpoints: BTreeMap<String, EndpointFault>,
    services: BTreeMap<String, ServiceFault>,
}

#[derive(Debug, Clone)]
pub struct LoadedPlan {
    pub plan: FaultPlan,
    pub coercions: Vec<Coercion>,
}

impl LoadedPlan {
    pub fn is_clean(&self) -> bool {
        self.coercions.is_empty()
    }
}

fn check(
    out: &mut Vec<Coercion>,
    target: &str,
    field: &'static str,
    requested: f64,
    stored: f64,
) {
    if was_coerced(requested, stored) {
        log_coercion(target, field, requested, stored);
        out.push(Coercion { target: target.to_string(), field, requested, stored });
    }
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_endpoint(&mut self, id: impl Into<String>, fault: EndpointFault) {
        self.endpoints.insert(id.into(), fault);
    }

    pub fn set_service(&mut self, id: impl Into<String>, fault: ServiceFault) {
        self.services.insert(id.into(), fault);
    }

    /// Store raw magnitudes for an endpoint, reporting every clamped field.
    pub fn apply_endpoint(&mut self, id: &str, input: EndpointFaultInput) -> Vec<Coercion> {
        let fault = EndpointFault::from(input);
        let mut out = Vec::new();
        check(&mut out, id, "increase_latency", input.increase_latency, fault.increase_latency());
        check(
            &mut out,
            id,
            "increase_error_rate_percent",
            input.increase_error_rate_percent,
            fault.increase_error_rate_percent(),
        );
        check(
            &mut out,
            id,
            "increase_request_count",
            input.increase_request_count,
            fault.increase_request_count(),
        );
        check(&mut out, id, "request_multiplier", input.request_multiplier, fault.request_multiplier());
        self.set_endpoint(id, fault);
        out
    }

    /// Store a raw replica reduction for a service, reporting a clamp if any.
    pub fn apply_service(&mut self, id: &str, input: ServiceFaultInput) -> Vec<Coercion> {
        let fault = ServiceFault::from(input);
        let mut out = Vec::new();
        check(
            &mut out,
            id,
            "reduced_replica_count",
            input.reduced_replica_count,
            fault.reduced_replica_count(),
        );
        self.set_service(id, fault);
        out
    }

    pub fn endpoint(&self, id: &str) -> Option<&EndpointFault> {
        self.endpoints.get(id)
    }

    pub fn service(&self, id: &str) -> Option<&ServiceFault> {
        self.services.get(id)
    }

    pub fn endpoint_mut(&mut self, id: &str) -> Option<&mut EndpointFault> {
        self.endpoints.get_mut(id)
    }

    pub fn service_mut(&mut self, id: &str) -> Option<&mut ServiceFault> {
        self.services.get_mut(id)
    }

    pub fn clear_endpoint(&mut self, id: &str) -> Option<EndpointFault> {
        self.endpoints.remove(id)
    }

    pub fn clear_service(&mut self, id: &str) -> Option<ServiceFault> {
        self.services.remove(id)
    }

    pub fn endpoints(&self) -> impl Iterator<Item = (&str, &EndpointFault)> {
        self.endpoints.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceFault)> {
        self.services.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len() + self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn from_json_str(raw: &str) -> Result<LoadedPlan> {
        let input: PlanInput = serde_json::from_str(raw).context("parse fault plan")?;
        let mut plan = FaultPlan::new();
        let mut coercions = Vec::new();
        for (id, e) in &input.endpoints {
            coercions.extend(plan.apply_endpoint(id, *e));
        }
        for (id, s) in &input.services {
            coercions.extend(plan.apply_service(id, *s));
        }
        Ok(LoadedPlan { plan, coercions })
    }

    pub fn load(path: &Path) -> Result<LoadedPlan> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read fault plan {}", path.display()))?;
        let loaded = Self::from_json_str(&raw)
            .with_context(|| format!("load fault plan {}", path.display()))?;
        log_plan_loaded(
            &path.display().to_string(),
            loaded.plan.endpoint_count(),
            loaded.plan.service_count(),
            loaded.coercions.len(),
            &loaded.plan.fingerprint(),
        );
        Ok(loaded)
    }

    /// First target holding a magnitude JSON cannot represent.
    fn non_finite_target(&self) -> Option<&str> {
        let ep = self.endpoints.iter().find(|(_, f)| {
            ![
                f.increase_latency(),
                f.increase_error_rate_percent(),
                f.increase_request_count(),
                f.request_multiplier(),
            ]
            .iter()
            .all(|v| v.is_finite())
        });
        if let Some((id, _)) = ep {
            return Some(id.as_str());
        }
        self.services
            .iter()
            .find(|(_, f)| !f.reduced_replica_count().is_finite())
            .map(|(id, _)| id.as_str())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        if let Some(id) = self.non_finite_target() {
            return Err(anyhow!("fault for {} has a non-finite magnitude", id));
        }
        serde_json::to_string_pretty(self).context("serialize fault plan")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let body = self.to_json_pretty()?;
        fs::write(path, body).with_context(|| format!("write fault plan {}", path.display()))?;
        log(
            Level::Info,
            Domain::Plan,
            "saved",
            obj(&[
                ("path", v_str(&path.display().to_string())),
                ("fingerprint", v_str(&self.fingerprint())),
            ]),
        );
        Ok(())
    }

    /// SHA-256 over the compact JSON of the plan. Maps are ordered, so equal
    /// plans share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let body = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document() {
        let loaded = FaultPlan::from_json_str("{}").unwrap();
        assert!(loaded.plan.is_empty());
        assert!(loaded.is_clean());
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let loaded = FaultPlan::from_json_str(
            r#"{"endpoints": {"GET /users": {"increase_latency": 120}}}"#,
        )
        .unwrap();
        let f = loaded.plan.endpoint("GET /users").unwrap();
        assert_eq!(f.increase_latency(), 120.0);
        assert_eq!(f.increase_error_rate_percent(), 0.0);
        assert_eq!(f.request_multiplier(), 0.0);
        assert!(loaded.is_clean());
    }

    #[test]
    fn test_reports_each_coerced_field() {
        let loaded = FaultPlan::from_json_str(
            r#"{
                "endpoints": {"checkout": {"increase_latency": -5, "increase_error_rate_percent": 150,
                                           "increase_request_count": 3, "request_multiplier": -2}},
                "services": {"db": {"reduced_replica_count": -1}}
            }"#,
        )
        .unwrap();
        let fields: Vec<(&str, &str)> =
            loaded.coercions.iter().map(|c| (c.target.as_str(), c.field)).collect();
        assert_eq!(
            fields,
            vec![
                ("checkout", "increase_latency"),
                ("checkout", "increase_error_rate_percent"),
                ("checkout", "request_multiplier"),
                ("db", "reduced_replica_count"),
            ]
        );
        let rate = &loaded.coercions[1];
        assert_eq!(rate.requested, 150.0);
        assert_eq!(rate.stored, 100.0);
        assert_eq!(loaded.plan.service("db").unwrap().reduced_replica_count(), 0.0);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(FaultPlan::from_json_str(r#"{"endpoint": {}}"#).is_err());
        assert!(FaultPlan::from_json_str(r#"{"services": {"db": {"replicas": 1}}}"#).is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = FaultPlan::from_json_str(
            r#"{"endpoints": {"a": {"increase_error_rate_percent": 500}, "a": {"increase_latency": 5}}}"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("duplicate id \"a\""));

        let res = FaultPlan::from_json_str(
            r#"{"services": {"db": {"reduced_replica_count": 1}, "db": {"reduced_replica_count": 2}}}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_same_id_across_maps_allowed() {
        let loaded = FaultPlan::from_json_str(
            r#"{"endpoints": {"db": {"increase_latency": 1}}, "services": {"db": {"reduced_replica_count": 1}}}"#,
        )
        .unwrap();
        assert_eq!(loaded.plan.len(), 2);
    }

    #[test]
    fn test_non_numeric_magnitude_rejected() {
        let res = FaultPlan::from_json_str(r#"{"services": {"db": {"reduced_replica_count": "two"}}}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_mutation_through_plan_keeps_invariants() {
        let mut plan = FaultPlan::new();
        plan.set_endpoint("search", EndpointFault::new(10.0, 5.0, 0.0, 1.0));
        plan.endpoint_mut("search").unwrap().set_increase_error_rate_percent(400.0);
        assert_eq!(plan.endpoint("search").unwrap().increase_error_rate_percent(), 100.0);
        assert!(plan.endpoint_mut("missing").is_none());
    }

    #[test]
    fn test_clear_removes_association() {
        let mut plan = FaultPlan::new();
        plan.set_service("cache", ServiceFault::new(2.0));
        plan.set_endpoint("GET /", EndpointFault::none());
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.clear_service("cache"), Some(ServiceFault::new(2.0)));
        assert!(plan.service("cache").is_none());
        assert_eq!(plan.len(), 1);
        assert!(plan.clear_service("cache").is_none());
    }

    #[test]
    fn test_nan_input_is_reported() {
        let mut plan = FaultPlan::new();
        let c = plan.apply_service("queue", ServiceFaultInput { reduced_replica_count: f64::NAN });
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].stored, 0.0);
    }

    #[test]
    fn test_normalized_plan_round_trips() {
        let loaded = FaultPlan::from_json_str(
            r#"{"endpoints": {"a": {"increase_error_rate_percent": 300}},
                "services": {"b": {"reduced_replica_count": 4}}}"#,
        )
        .unwrap();
        let json = loaded.plan.to_json_pretty().unwrap();
        let again = FaultPlan::from_json_str(&json).unwrap();
        assert!(again.is_clean());
        assert_eq!(again.plan, loaded.plan);
        assert_eq!(again.plan.fingerprint(), loaded.plan.fingerprint());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let mut a = FaultPlan::new();
        a.set_endpoint("x", EndpointFault::new(1.0, 0.0, 0.0, 0.0));
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.endpoint_mut("x").unwrap().set_increase_latency(2.0);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_infinite_magnitude_refuses_to_serialize() {
        let mut plan = FaultPlan::new();
        plan.set_endpoint("slow", EndpointFault::new(f64::INFINITY, 0.0, 0.0, 0.0));
        assert!(plan.to_json_pretty().is_err());
    }
}
