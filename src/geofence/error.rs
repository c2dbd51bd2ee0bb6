use derive_more::Display;
use strum::AsRefStr;

use crate::store::StoreError;

/// Everything that can keep a check-in from going ahead.
///
/// All of these are handled at the screen level: the caller shows the message
/// and leaves the check-in action disabled. `OutOfRange` is the normal state of
/// a closed gate and only surfaces when check-in is pressed anyway.
#[derive(Debug, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceError {
    #[display(fmt = "Office location not set. Please contact admin.")]
    ConfigurationMissing,

    #[display(fmt = "Invalid office location data. Please contact admin.")]
    ConfigurationInvalid,

    #[display(fmt = "Location permission denied. Please enable location permissions in settings.")]
    PermissionDenied,

    #[display(fmt = "Location permission blocked. Please enable it in system settings.")]
    PermissionBlocked,

    #[display(fmt = "Unable to get location. Please enable location services.")]
    LocationUnavailable(String),

    #[display(fmt = "You must be within 200m of office to check in. Current distance: {:.1}m", distance_m)]
    OutOfRange { distance_m: f64 },

    #[display(fmt = "Attendance storage failed: {}", _0)]
    Store(StoreError),
}

impl std::error::Error for AttendanceError {}

impl From<StoreError> for AttendanceError {
    fn from(e: StoreError) -> Self {
        AttendanceError::Store(e)
    }
}

impl AttendanceError {
    /// Stable snake_case name of the variant.
    pub fn kind(&self) -> &str {
        self.as_ref()
    }

    /// The user should be sent to the system settings screen.
    pub fn opens_settings(&self) -> bool {
        matches!(self, AttendanceError::PermissionBlocked)
    }
}
