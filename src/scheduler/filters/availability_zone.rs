use super::{hint_list, HostFilter};
use crate::host::HostState;
use crate::scheduler::{FilterProperties, SpecPredicate};

/// Extra-spec restricting a type to a comma-separated list of zones.
pub const AVAILABILITY_ZONES_SPEC: &str = "availability_zones";

/// Keeps hosts in the requested availability zone and, when the type pins
/// a zone list, in one of those zones.
pub struct AvailabilityZoneFilter;

impl HostFilter for AvailabilityZoneFilter {
    fn name(&self) -> &'static str {
        "AvailabilityZoneFilter"
    }

    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        let host_zone = host.availability_zone.as_deref();

        if let Some(requested) = props.availability_zone_id.as_deref() {
            if host_zone != Some(requested) {
                return false;
            }
        }

        let allowed = props
            .extra_specs()
            .and_then(|specs| specs.get(AVAILABILITY_ZONES_SPEC));
        match allowed {
            Some(SpecPredicate::Equals(zones)) | Some(SpecPredicate::In(zones)) => {
                host_zone.is_some_and(|zone| hint_list(zones).any(|z| z == zone))
            }
            Some(SpecPredicate::Is(_)) | None => true,
        }
    }
}
