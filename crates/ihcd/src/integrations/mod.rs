pub mod ihc;
