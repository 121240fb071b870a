pub const USAGE: &str = "lc3 [image-file1] ...";

#[derive(Debug, PartialEq)]
pub struct Config {
    pub image_paths: Vec<String>,
}

impl Config {
    /// `args` is the full `std::env::args()` sequence, program name
    /// included. At least one image path is required.
    pub fn with(args: &[String]) -> Result<Self, &'static str> {
        if args.len() < 2 {
            return Err(USAGE);
        }

        Ok(Self {
            image_paths: args[1..].to_vec(),
        })
    }
}
