use clap::Parser;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Address to listen on
    #[clap(short = 'l', long, default_value = "localhost:9001")]
    pub listen_addr: String,

    /// Require this handshake path; any path is accepted when omitted
    #[clap(short = 'p', long)]
    pub path: Option<String>,

    /// Per-connection buffer capacity in bytes
    /// (anything but a power of two becomes 4096)
    #[clap(short = 'b', long, default_value_t = 0x1000)]
    pub buf_capacity: usize,

    /// Seconds a connection may sit idle between frames
    #[clap(short = 't', long, default_value_t = 60)]
    pub timeout: u64,

    /// Enables debug logging
    #[clap(short = 'v', long)]
    pub verbose: bool,
}
