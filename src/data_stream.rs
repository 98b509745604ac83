use openssl::ssl::SslStream;

use std::{
    io::{Read, Result, Write},
    net::{Shutdown, TcpStream},
};

/// Socket used for both the control and the data channel
#[derive(Debug)]
pub enum DataStream {
    Tcp(TcpStream),
    Ssl(SslStream<TcpStream>),
}

impl DataStream {
    /// Unwrap the plain socket, e.g. to hand it to a TLS handshake.
    /// Returns `None` if the stream is already secured.
    pub fn into_tcp_stream(self) -> Option<TcpStream> {
        match self {
            DataStream::Tcp(stream) => Some(stream),
            DataStream::Ssl(_) => None,
        }
    }

    /// Test if the stream is secured
    pub fn is_ssl(&self) -> bool {
        matches!(*self, DataStream::Ssl(_))
    }

    /// Returns a reference to the underlying TcpStream.
    pub fn get_ref(&self) -> &TcpStream {
        match *self {
            DataStream::Tcp(ref stream) => stream,
            DataStream::Ssl(ref stream) => stream.get_ref(),
        }
    }

    /// Close the stream, sending a TLS close_notify first when secured.
    /// Servers that check for a clean TLS shutdown refuse the transfer otherwise.
    pub fn finish(self) {
        match self {
            DataStream::Tcp(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
            DataStream::Ssl(mut stream) => {
                let _ = stream.flush();
                let _ = stream.shutdown();
                let _ = stream.get_ref().shutdown(Shutdown::Both);
            }
        }
    }
}

impl Read for DataStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match *self {
            DataStream::Tcp(ref mut stream) => stream.read(buf),
            DataStream::Ssl(ref mut stream) => stream.read(buf),
        }
    }
}

impl Write for DataStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match *self {
            DataStream::Tcp(ref mut stream) => stream.write(buf),
            DataStream::Ssl(ref mut stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match *self {
            DataStream::Tcp(ref mut stream) => stream.flush(),
            DataStream::Ssl(ref mut stream) => stream.flush(),
        }
    }
}
