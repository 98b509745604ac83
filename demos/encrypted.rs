extern crate ftp_batch;

use ftp_batch::{test_credentials, FtpConfig, FtpConnector};

fn main() {
    let mut config = FtpConfig::new("127.0.0.1");
    config.password = Some(String::new());
    config.secure = true;
    config.ignore_tls_issues = true;
    // Client certificate chain and key, pasted without line breaks
    config.certificate = std::env::var("FTP_CLIENT_CERT").ok();
    config.private_key = std::env::var("FTP_CLIENT_KEY").ok();

    let check = test_credentials(&FtpConnector, &config);
    println!("{}: {}", if check.is_ok() { "OK" } else { "Error" }, check.message);
}
