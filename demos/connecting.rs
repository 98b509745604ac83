extern crate ftp_batch;

use ftp_batch::bridge::ChunkCollector;
use ftp_batch::{ConnectOptions, Connection, FtpConfig, FtpStream, Result};

fn test_ftp(host: &str, user: &str, pass: &str) -> Result<()> {
    let mut config = FtpConfig::new(host);
    config.user = user.to_owned();
    config.password = Some(pass.to_owned());

    let mut ftp_stream = FtpStream::access(&ConnectOptions::from_config(&config)?)?;
    println!("current dir: {}", ftp_stream.pwd()?);

    for entry in ftp_stream.list("test_data")? {
        println!("{:?} {:>10} {}", entry.kind, entry.size, entry.name);
    }

    // Chunks arrive as they are read from the data connection
    let mut collector = ChunkCollector::new();
    ftp_stream.download_to(&mut collector, "test_data/ftpext-charter.txt")?;
    println!("got {} chunks", collector.chunks());
    println!("got data: {}", String::from_utf8_lossy(&collector.into_buffer()));

    let mut reader: &[u8] = b"Some awesome file data man!!";
    ftp_stream.upload_from(&mut reader, "test_data/my_random_file.txt")?;

    ftp_stream.close();
    Ok(())
}

fn main() {
    test_ftp("127.0.0.1", "Doe", "mumble").unwrap_or_else(|err| panic!("{}", err));
    println!("test successful")
}
