mod ply_header;
pub use self::ply_header::*;

mod ply_reader;
pub use self::ply_reader::*;

mod ply_writer;
pub use self::ply_writer::*;
