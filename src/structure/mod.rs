pub mod constraints;
pub mod hmsvm;
pub mod loss;
pub mod model;
pub mod weights;
