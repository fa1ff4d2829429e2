// Domain layer: dataset models, review statistics and the PRISMA flow core.

pub mod agreement;
pub mod dataset;
pub mod flow;
pub mod model;
pub mod ports;
pub mod stats;
pub mod synthesis;
pub mod table;
