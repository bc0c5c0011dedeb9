//! Customer-facing workflows. Customer records themselves are owned by the CRM core and are
//! only referenced here.

pub mod follow_ups;
