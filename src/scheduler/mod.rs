pub mod runner;

pub use runner::{AccountVisit, PassReport, Phase, ScheduleConfig, Scheduler, VisitStatus};
