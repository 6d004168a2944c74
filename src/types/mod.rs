pub mod outline;
pub mod reference;
