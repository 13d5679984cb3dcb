pub mod lid;
pub mod mic;
pub mod presence;
