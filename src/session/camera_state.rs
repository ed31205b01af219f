//! What the session believes the camera is currently set to.

use crate::exposure::ExposureConfig;
use crate::exposure::camera::Parameter;

/// Last confirmed settings, one field at a time.
///
/// A field only changes after the device acknowledged the write, so a failed
/// command leaves it stale and the next tick tries again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraState {
    applied: ExposureConfig,
}

impl CameraState {
    pub fn applied(&self) -> &ExposureConfig {
        &self.applied
    }

    /// Settings in `desired` that differ from what is applied, in
    /// application order. Unset fields in `desired` never produce a change.
    pub fn pending_changes(&self, desired: &ExposureConfig) -> Vec<(Parameter, String)> {
        desired
            .settings()
            .into_iter()
            .filter(|(parameter, label)| self.applied.label_for(*parameter).as_ref() != Some(label))
            .collect()
    }

    /// Mark one field of `desired` as confirmed by the device.
    pub fn confirm(&mut self, parameter: Parameter, desired: &ExposureConfig) {
        self.applied.copy_field(parameter, desired);
    }

    pub fn is_satisfied_by(&self, desired: &ExposureConfig) -> bool {
        self.pending_changes(desired).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::policy_for;
    use crate::phase::SkyPhase;

    #[test]
    fn test_fresh_state_needs_every_set_field() {
        let state = CameraState::default();
        let night = policy_for(SkyPhase::Night);
        assert_eq!(state.pending_changes(&night), night.settings());
    }

    #[test]
    fn test_confirmed_fields_are_not_repeated() {
        let mut state = CameraState::default();
        let night = policy_for(SkyPhase::Night);
        for (parameter, _) in night.settings() {
            state.confirm(parameter, &night);
        }
        assert!(state.is_satisfied_by(&night));
        assert!(state.pending_changes(&night).is_empty());
    }

    #[test]
    fn test_unset_fields_keep_previous_values() {
        let mut state = CameraState::default();
        let night = policy_for(SkyPhase::Night);
        for (parameter, _) in night.settings() {
            state.confirm(parameter, &night);
        }

        // Dawn leaves aperture and ISO alone
        let dawn = policy_for(SkyPhase::MorningCivilTwilight);
        let changes: Vec<_> = state.pending_changes(&dawn).into_iter().map(|(p, _)| p).collect();
        assert_eq!(changes, vec![Parameter::ShootingMode, Parameter::ExposureTime]);

        for parameter in changes {
            state.confirm(parameter, &dawn);
        }
        assert_eq!(state.applied().aperture, night.aperture);
        assert_eq!(state.applied().iso, night.iso);
    }

    #[test]
    fn test_partial_confirmation_leaves_other_fields_pending() {
        let mut state = CameraState::default();
        let night = policy_for(SkyPhase::Night);
        state.confirm(Parameter::ShootingMode, &night);
        state.confirm(Parameter::ExposureTime, &night);

        let pending: Vec<_> = state.pending_changes(&night).into_iter().map(|(p, _)| p).collect();
        assert_eq!(pending, vec![Parameter::Aperture, Parameter::Iso]);
    }
}
