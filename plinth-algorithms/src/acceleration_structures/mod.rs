mod kd_tree;
pub use self::kd_tree::*;
