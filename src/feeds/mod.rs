pub mod yahoo;
