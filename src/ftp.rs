//! FTP module.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use openssl::pkey::PKey;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use openssl::x509::X509;
use regex::Regex;
use tracing::{debug, warn};

use crate::bridge::ChunkSink;
use crate::data_stream::DataStream;
use crate::listing::{self, DirectoryEntry};
use crate::session::{ConnectOptions, Connection, TlsMode, TlsOptions};
use crate::status;
use crate::types::{FtpError, Reply, Result};

const CHUNK_SIZE: usize = 65_536;

lazy_static! {
    // This regex extracts IP and Port details from PASV command response.
    // The regex looks for the pattern (h1,h2,h3,h4,p1,p2).
    static ref PORT_RE: Regex = Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").unwrap();

    // EPSV response format : 229 Entering Extended Passive Mode (|||6446|)
    static ref EPSV_RE: Regex = Regex::new(r"\(\|\|\|(\d+)\|\)").unwrap();
}

/// TLS settings kept for the lifetime of a session, so every data
/// connection is secured the same way as the control connection.
struct TlsContext {
    connector: SslConnector,
    domain: String,
    verify: bool,
}

impl TlsContext {
    fn new(domain: &str, options: &TlsOptions) -> Result<TlsContext> {
        let mut builder = SslConnector::builder(SslMethod::tls())?;

        if let Some(ref cert) = options.cert {
            let mut chain = X509::stack_from_pem(cert.as_bytes())?.into_iter();
            match chain.next() {
                Some(leaf) => builder.set_certificate(&leaf)?,
                None => return Err(FtpError::SecureError("no certificate found in PEM".to_owned())),
            }
            for extra in chain {
                builder.add_extra_chain_cert(extra)?;
            }
        }
        if let Some(ref key) = options.key {
            let key = PKey::private_key_from_pem(key.as_bytes())?;
            builder.set_private_key(&key)?;
        }
        if !options.reject_unauthorized {
            builder.set_verify(SslVerifyMode::NONE);
        }

        Ok(TlsContext {
            connector: builder.build(),
            domain: domain.to_owned(),
            verify: options.reject_unauthorized,
        })
    }

    fn wrap(&self, stream: TcpStream) -> Result<DataStream> {
        let mut config = self.connector.configure()?;
        config.set_verify_hostname(self.verify);
        config
            .connect(&self.domain, stream)
            .map(DataStream::Ssl)
            .map_err(|e| FtpError::SecureError(e.to_string()))
    }
}

/// Stream to interface with the FTP server. This interface is only for the command stream.
pub struct FtpStream {
    reader: BufReader<DataStream>,
    tls: Option<TlsContext>,
    timeout: Duration,
    verbose: bool,
    epsv: bool,
    closed: bool,
}

impl fmt::Debug for FtpStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FtpStream")
            .field("peer", &self.get_ref().peer_addr().ok())
            .field("secure", &self.reader.get_ref().is_ssl())
            .field("closed", &self.closed)
            .finish()
    }
}

impl FtpStream {
    /// Connect, secure the control channel as requested and log in.
    pub fn access(options: &ConnectOptions) -> Result<FtpStream> {
        let port = options.effective_port();
        debug!(host = %options.host, port, mode = ?options.secure, "connecting");

        let tcp = connect_tcp(&options.host, port, options.timeout)?;
        let tls = match options.secure {
            TlsMode::Plain => None,
            _ => Some(TlsContext::new(&options.host, &options.secure_options)?),
        };

        let control = match (options.secure, tls.as_ref()) {
            (TlsMode::Implicit, Some(ctx)) => ctx.wrap(tcp)?,
            _ => DataStream::Tcp(tcp),
        };
        let mut ftp_stream = FtpStream {
            reader: BufReader::new(control),
            tls: None,
            timeout: options.timeout,
            verbose: options.verbose,
            epsv: true,
            closed: false,
        };
        ftp_stream.read_response(status::READY)?;

        if let Some(ctx) = tls {
            ftp_stream = match options.secure {
                TlsMode::Explicit => ftp_stream.into_secure(ctx)?,
                _ => {
                    ftp_stream.tls = Some(ctx);
                    ftp_stream.protect()?;
                    ftp_stream
                }
            };
        }

        if let Err(err) = ftp_stream.login(&options.user, &options.password) {
            ftp_stream.close();
            return Err(err);
        }
        debug!(host = %options.host, user = %options.user, "logged in");
        Ok(ftp_stream)
    }

    /// Switch the control channel to TLS with `AUTH TLS` and protect the data channel.
    fn into_secure(mut self, ctx: TlsContext) -> Result<FtpStream> {
        // Ask the server to start securing data.
        self.write_str("AUTH TLS\r\n")?;
        self.read_response(status::AUTH_OK)?;

        let FtpStream {
            reader,
            timeout,
            verbose,
            epsv,
            ..
        } = self;
        let tcp = reader.into_inner().into_tcp_stream().ok_or_else(|| {
            FtpError::SecureError("control connection is already secured".to_owned())
        })?;

        let mut secured = FtpStream {
            reader: BufReader::new(ctx.wrap(tcp)?),
            tls: Some(ctx),
            timeout,
            verbose,
            epsv,
            closed: false,
        };
        secured.protect()?;
        Ok(secured)
    }

    /// Set protection buffer size and data channel protection to Private.
    fn protect(&mut self) -> Result<()> {
        self.write_str("PBSZ 0\r\n")?;
        self.read_response(status::COMMAND_OK)?;
        self.write_str("PROT P\r\n")?;
        self.read_response(status::COMMAND_OK)?;
        Ok(())
    }

    /// Returns a reference to the underlying TcpStream.
    pub fn get_ref(&self) -> &TcpStream {
        self.reader.get_ref().get_ref()
    }

    /// Log in to the FTP server.
    pub fn login(&mut self, user: &str, password: &str) -> Result<()> {
        self.write_str(format!("USER {}\r\n", user))?;
        let reply = self.read_response_in(&[status::LOGGED_IN, status::NEED_PASSWORD])?;
        if reply.code == status::NEED_PASSWORD {
            self.write_str(format!("PASS {}\r\n", password))?;
            self.read_response(status::LOGGED_IN)?;
        }
        Ok(())
    }

    /// Change the current directory to the path specified.
    pub fn cwd(&mut self, path: &str) -> Result<()> {
        self.write_str(format!("CWD {}\r\n", path))?;
        self.read_response(status::REQUESTED_FILE_ACTION_OK).map(|_| ())
    }

    /// Move the current directory to the parent directory.
    pub fn cdup(&mut self) -> Result<()> {
        self.write_str("CDUP\r\n")?;
        self.read_response_in(&[status::COMMAND_OK, status::REQUESTED_FILE_ACTION_OK])
            .map(|_| ())
    }

    /// Gets the current directory
    pub fn pwd(&mut self) -> Result<String> {
        self.write_str("PWD\r\n")?;
        let Reply { message, .. } = self.read_response(status::PATH_CREATED)?;
        match (message.find('"'), message.rfind('"')) {
            (Some(begin), Some(end)) if begin < end => Ok(message[begin + 1..end].to_string()),
            _ => Err(FtpError::InvalidResponse(format!(
                "Invalid PWD Response: {}",
                message
            ))),
        }
    }

    /// This creates a new directory on the server.
    pub fn mkdir(&mut self, pathname: &str) -> Result<()> {
        self.write_str(format!("MKD {}\r\n", pathname))?;
        self.read_response(status::PATH_CREATED).map(|_| ())
    }

    /// Removes the remote pathname from the server. The directory must be empty.
    pub fn rmdir(&mut self, pathname: &str) -> Result<()> {
        self.write_str(format!("RMD {}\r\n", pathname))?;
        self.read_response(status::REQUESTED_FILE_ACTION_OK).map(|_| ())
    }

    /// Remove the remote file from the server.
    pub fn rm(&mut self, filename: &str) -> Result<Reply> {
        self.write_str(format!("DELE {}\r\n", filename))?;
        self.read_response(status::REQUESTED_FILE_ACTION_OK)
    }

    /// Switch to image (binary) mode. Every transfer runs in this mode.
    pub fn binary_mode(&mut self) -> Result<()> {
        self.write_str("TYPE I\r\n")?;
        self.read_response(status::COMMAND_OK).map(|_| ())
    }

    /// Quits the current FTP session.
    pub fn quit(&mut self) -> Result<()> {
        self.write_str("QUIT\r\n")?;
        self.read_response(status::CLOSING).map(|_| ())
    }

    /// Runs the EPSV command. The data connection goes to the control peer.
    fn epsv(&mut self) -> Result<SocketAddr> {
        self.write_str("EPSV\r\n")?;
        let Reply { message, .. } = self.read_response(status::EXTENDED_PASSIVE_MODE)?;
        let port = EPSV_RE
            .captures(&message)
            .and_then(|caps| caps[1].parse::<u16>().ok())
            .ok_or_else(|| FtpError::InvalidResponse(format!("Invalid EPSV response: {}", message)))?;
        Ok(SocketAddr::new(self.get_ref().peer_addr()?.ip(), port))
    }

    /// Runs the PASV command.
    fn pasv(&mut self) -> Result<SocketAddr> {
        self.write_str("PASV\r\n")?;
        // PASV response format : 227 Entering Passive Mode (h1,h2,h3,h4,p1,p2).
        let Reply { message, .. } = self.read_response(status::PASSIVE_MODE)?;
        let invalid = || FtpError::InvalidResponse(format!("Invalid PASV response: {}", message));
        let caps = PORT_RE.captures(&message).ok_or_else(invalid)?;
        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = caps[i + 1].parse().map_err(|_| invalid())?;
        }
        let announced = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
        let port = (u16::from(octets[4]) << 8) | u16::from(octets[5]);

        // Servers behind NAT announce their private address; dial the control peer instead.
        let peer = self.get_ref().peer_addr()?.ip();
        let ip = match peer {
            IpAddr::V4(peer_v4)
                if announced.is_unspecified()
                    || (announced.is_private() && !peer_v4.is_private()) =>
            {
                peer
            }
            IpAddr::V6(_) if announced.is_unspecified() => peer,
            _ => IpAddr::V4(announced),
        };
        Ok(SocketAddr::new(ip, port))
    }

    /// Negotiate a passive data address, preferring EPSV while the server accepts it.
    fn passive_addr(&mut self) -> Result<SocketAddr> {
        if self.epsv {
            match self.epsv() {
                Ok(addr) => return Ok(addr),
                Err(FtpError::UnexpectedReply(ref reply)) if status::is_negative(reply.code) => {
                    debug!(code = reply.code, "EPSV refused, falling back to PASV");
                    self.epsv = false;
                }
                Err(err) => return Err(err),
            }
        }
        self.pasv()
    }

    /// Execute command which send data back in a separate stream
    fn data_command(&mut self, cmd: &str) -> Result<DataStream> {
        let addr = self.passive_addr()?;
        let stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        self.write_str(format!("{}\r\n", cmd))?;
        self.read_response_in(status::TRANSFER_STARTING)?;

        let wrapped = match self.tls {
            Some(ref ctx) => ctx.wrap(stream),
            None => return Ok(DataStream::Tcp(stream)),
        };
        if wrapped.is_err() {
            // The server still closes the transfer it announced; consume that reply.
            match self.read_response_in(status::TRANSFER_COMPLETE) {
                Ok(reply) | Err(FtpError::UnexpectedReply(reply)) => {
                    debug!(code = reply.code, "data channel handshake failed");
                }
                Err(err) => debug!(error = %err, "no reply after failed data handshake"),
            }
        }
        wrapped
    }

    /// Read the reply that ends a transfer. The reply is consumed even when
    /// the transfer itself failed so that the control channel stays in step.
    fn finish_transfer<T>(&mut self, data: DataStream, outcome: Result<T>) -> Result<(T, Reply)> {
        data.finish();
        let reply = self.read_response_in(status::TRANSFER_COMPLETE);
        let value = outcome?;
        Ok((value, reply?))
    }

    /// Execute `LIST` and parse its output. An empty `pathname` lists the
    /// current directory.
    pub fn list(&mut self, pathname: &str) -> Result<Vec<DirectoryEntry>> {
        let command = if pathname.is_empty() {
            "LIST".to_owned()
        } else {
            format!("LIST {}", pathname)
        };

        let mut data = self.data_command(&command)?;
        let mut raw = Vec::new();
        let outcome = data.read_to_end(&mut raw).map_err(FtpError::from);
        self.finish_transfer(data, outcome)?;

        let text = String::from_utf8_lossy(&raw);
        let lines: Vec<&str> = text.lines().collect();
        Ok(listing::parse_listing(&lines))
    }

    /// The implementation of `RETR`: every chunk read from the data
    /// connection is handed to `sink` as it arrives.
    pub fn retr(&mut self, filename: &str, sink: &mut dyn ChunkSink) -> Result<Reply> {
        self.binary_mode()?;
        let mut data = self.data_command(&format!("RETR {}", filename))?;

        let outcome = (|| -> Result<u64> {
            let mut buf = vec![0u8; CHUNK_SIZE];
            let mut total = 0u64;
            loop {
                let n = data.read(&mut buf)?;
                if n == 0 {
                    return Ok(total);
                }
                sink.receive(&buf[..n])?;
                total += n as u64;
            }
        })();

        let (total, reply) = self.finish_transfer(data, outcome)?;
        debug!(file = filename, bytes = total, "downloaded");
        Ok(reply)
    }

    /// The implementation of `STOR`: `r` is copied to the data connection
    /// until it reports end of stream.
    pub fn put(&mut self, filename: &str, r: &mut dyn Read) -> Result<Reply> {
        self.binary_mode()?;
        let mut data = self.data_command(&format!("STOR {}", filename))?;
        let outcome = io::copy(r, &mut data)
            .and_then(|n| data.flush().map(|_| n))
            .map_err(FtpError::from);

        let (total, reply) = self.finish_transfer(data, outcome)?;
        debug!(file = filename, bytes = total, "uploaded");
        Ok(reply)
    }

    /// Enter `path`, creating every missing directory on the way.
    pub fn ensure_dir(&mut self, path: &str) -> Result<()> {
        if path.starts_with('/') {
            self.cwd("/")?;
        }
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            match self.cwd(segment) {
                Ok(()) => {}
                Err(FtpError::UnexpectedReply(_)) => {
                    self.mkdir(segment)?;
                    self.cwd(segment)?;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Remove `path` with all of its contents. The working directory is
    /// restored afterwards.
    pub fn remove_tree(&mut self, path: &str) -> Result<()> {
        let origin = self.pwd()?;
        let outcome = self.remove_tree_at(path);
        if let Err(err) = self.cwd(&origin) {
            warn!(directory = %origin, error = %err, "could not restore working directory");
        }
        outcome
    }

    fn remove_tree_at(&mut self, path: &str) -> Result<()> {
        self.cwd(path)?;
        let absolute = self.pwd()?;
        self.clear_working_dir()?;
        if absolute != "/" {
            self.cdup()?;
            self.rmdir(&absolute)?;
        }
        Ok(())
    }

    fn clear_working_dir(&mut self) -> Result<()> {
        for entry in self.list("")? {
            if entry.is_directory() {
                self.cwd(&entry.name)?;
                self.clear_working_dir()?;
                self.cdup()?;
                self.rmdir(&entry.name)?;
            } else {
                self.rm(&entry.name)?;
            }
        }
        Ok(())
    }

    fn write_str<S: AsRef<str>>(&mut self, command: S) -> Result<()> {
        let command = command.as_ref();
        if self.verbose {
            if command.starts_with("PASS ") {
                debug!("> PASS ****");
            } else {
                debug!("> {}", command.trim_end());
            }
        }

        let stream = self.reader.get_mut();
        stream.write_all(command.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    pub fn read_response(&mut self, expected_code: u32) -> Result<Reply> {
        self.read_response_in(&[expected_code])
    }

    /// Retrieve a complete, possibly multi-line, reply.
    pub fn read_response_in(&mut self, expected_code: &[u32]) -> Result<Reply> {
        let mut line = String::new();
        self.reader.read_line(&mut line)?;
        if self.verbose {
            debug!("< {}", line.trim_end());
        }

        if line.len() < 4 {
            return Err(FtpError::InvalidResponse(
                "error: could not read reply code".to_owned(),
            ));
        }

        let code: u32 = line
            .get(0..3)
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| {
                FtpError::InvalidResponse(format!("error: could not parse reply code: {}", line))
            })?;
        let mut message = line.get(4..).unwrap_or("").trim_end().to_owned();

        // multiple line reply
        // loop until a line begins with the code and a space
        if line.as_bytes()[3] == b'-' {
            let expected = format!("{} ", &line[0..3]);
            loop {
                line.clear();
                if self.reader.read_line(&mut line)? == 0 {
                    return Err(FtpError::InvalidResponse(
                        "connection closed inside a multi-line reply".to_owned(),
                    ));
                }
                if self.verbose {
                    debug!("< {}", line.trim_end());
                }
                let last = line.starts_with(&expected);
                let text = if last { line.get(4..).unwrap_or("") } else { &line[..] };
                message.push('\n');
                message.push_str(text.trim_end());
                if last {
                    break;
                }
            }
        }

        let reply = Reply::new(code, message);
        if expected_code.contains(&code) {
            Ok(reply)
        } else {
            Err(FtpError::UnexpectedReply(reply))
        }
    }
}

impl Connection for FtpStream {
    fn list(&mut self, path: &str) -> Result<Vec<DirectoryEntry>> {
        FtpStream::list(self, path)
    }

    fn remove(&mut self, path: &str) -> Result<Reply> {
        self.rm(path)
    }

    fn remove_dir(&mut self, path: &str) -> Result<()> {
        self.remove_tree(path)
    }

    fn ensure_dir(&mut self, path: &str) -> Result<()> {
        FtpStream::ensure_dir(self, path)
    }

    fn download_to(&mut self, sink: &mut dyn ChunkSink, path: &str) -> Result<Reply> {
        self.retr(path, sink)
    }

    fn upload_from(&mut self, source: &mut dyn Read, path: &str) -> Result<Reply> {
        self.put(path, source)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.quit() {
            debug!(error = %err, "QUIT failed");
        }
        let _ = self.get_ref().shutdown(Shutdown::Both);
    }
}

/// Try every address `host` resolves to until one accepts.
fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(err) => {
                debug!(%addr, error = %err, "connect failed");
                last_err = Some(err);
            }
        }
    }
    Err(FtpError::ConnectionError(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} did not resolve to any address", host),
        )
    })))
}
