pub mod cleanlab;
