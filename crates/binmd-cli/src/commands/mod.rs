pub mod neighbors;
pub mod run;
