//! The `RTSLOAD` invocation surface: catalog lookup, binding, validation, and
//! scheduling in one call with a single error type.

use chrono::{DateTime, Utc};
use rts_types::{ConcreteProcedure, SlotId};
use tracing::info;

use crate::{
    catalog::ProcedureCatalog,
    error::LoadError,
    executor::Scheduler,
    procedure::{bind, validate},
    request::LoadRequest,
};

/// Looks up, binds, and validates the procedure `request` names.
pub fn resolve_request(catalog: &ProcedureCatalog, request: &LoadRequest) -> Result<ConcreteProcedure, LoadError> {
    let procedure = catalog.procedure(&request.procedure)?;
    let concrete = bind(&procedure, &request.bindings)?;
    validate(&concrete)?;
    Ok(concrete)
}

/// Executes `request` against `scheduler`, activating the procedure at `activation`.
///
/// Any error leaves the scheduler exactly as it was.
pub fn rtsload(
    scheduler: &mut Scheduler,
    catalog: &ProcedureCatalog,
    request: &LoadRequest,
    activation: DateTime<Utc>,
) -> Result<SlotId, LoadError> {
    let concrete = resolve_request(catalog, request)?;
    let slot = match request.slot {
        Some(slot) => scheduler.load_into(slot, concrete, activation, request.priority)?,
        None => scheduler.load(concrete, activation, request.priority)?,
    };
    info!(procedure = %request.procedure, slot = %slot, activation = %activation, "RTSLOAD accepted");
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Dispatcher, SchedulerSettings};
    use crate::procedure::BindingError;
    use chrono::TimeZone;
    use rts_types::SlotStatus;
    use std::time::Duration;

    const CTI: &str = "\
PARAM, NUM_HOURS, DURATION, MIN=000:00:01:00, MAX=000:21:00:00
/CMD, OORMPEN
/CMD, OORMPDS, DELTA=&NUM_HOURS&
";

    fn catalog() -> ProcedureCatalog {
        let mut catalog = ProcedureCatalog::new();
        catalog.insert_source("1_CTI06", CTI);
        catalog
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedulerSettings::default(), Dispatcher::new(Duration::from_secs(1)))
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 9, 8, 20, 45, 0).unwrap()
    }

    #[test]
    fn loads_into_the_requested_slot() {
        let mut scheduler = scheduler();
        let request = LoadRequest::new("1_CTI06").with_slot(SlotId(135)).with_binding("NUM_HOURS", "000:04:00:00");

        let slot = rtsload(&mut scheduler, &catalog(), &request, start()).expect("load");
        assert_eq!(slot, SlotId(135));
        assert_eq!(scheduler.status(slot).expect("status").status, SlotStatus::Loaded);
    }

    #[test]
    fn out_of_bounds_binding_is_refused_without_side_effects() {
        let mut scheduler = scheduler();
        let request = LoadRequest::new("1_CTI06").with_binding("NUM_HOURS", "001:00:00:00");

        let error = rtsload(&mut scheduler, &catalog(), &request, start()).expect_err("exceeds 21h");
        assert!(matches!(error, LoadError::Constraint(ref violation) if violation.parameter == "NUM_HOURS"));
        assert_eq!(scheduler.slots().count(), 0);
    }

    #[test]
    fn reports_each_load_error_kind() {
        let mut scheduler = scheduler();
        let catalog = catalog();

        let unknown = rtsload(&mut scheduler, &catalog, &LoadRequest::new("NOPE"), start());
        assert_eq!(unknown, Err(LoadError::UnknownProcedure("NOPE".into())));

        let unbound = rtsload(&mut scheduler, &catalog, &LoadRequest::new("1_CTI06"), start());
        assert_eq!(unbound, Err(LoadError::Binding(BindingError::Unbound { name: "NUM_HOURS".into() })));

        let request = LoadRequest::new("1_CTI06").with_slot(SlotId(1)).with_binding("NUM_HOURS", "000:04:00:00");
        assert!(matches!(
            rtsload(&mut scheduler, &catalog, &request, start()),
            Err(LoadError::SlotOutOfRange { .. })
        ));
        assert!(scheduler.is_idle());
    }
}
