pub mod artifact;
pub mod audit;
pub mod delivery;
pub mod intake;
pub mod job;
pub mod pdf;
pub mod ranking;
pub mod risk;
pub mod rule;
pub mod run;
pub mod safety;
pub mod sections;
pub mod validation;
