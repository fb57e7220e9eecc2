// Jobs module - Background work

pub mod expiry_sweep;
