use crate::types::ButtonCode;

/// Internal commands sent to the runtime thread.
pub(crate) enum Command {
    /// Re-resolve the start button of every tracked device matching the type.
    SetStartButton {
        vendor_id: u16,
        product_id: u16,
        name: String,
        code: ButtonCode,
    },
}
