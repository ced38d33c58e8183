pub mod payplus;
