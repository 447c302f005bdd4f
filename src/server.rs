//! Local socket front end for the corrector.
//!
//! One exchange per connection: the client writes a sentence (UTF-8, at most
//! `max_request_bytes`), the server answers with the corrected sentence and
//! closes. Oversized, empty, or undecodable requests are closed without a
//! reply. Each connection runs on its own thread; the corrector is read-only,
//! so connections never affect each other.

use crate::corrector::Corrector;
use crate::error::Result;
use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

pub struct Server {
    listener: UnixListener,
    socket_path: PathBuf,
    corrector: Arc<Corrector>,
    max_request_bytes: usize,
}

impl Server {
    /// Bind `socket_path`, replacing a stale socket file if one exists.
    pub fn bind(
        socket_path: &Path,
        corrector: Arc<Corrector>,
        max_request_bytes: usize,
    ) -> Result<Self> {
        if socket_path.exists() {
            fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        fs::set_permissions(socket_path, fs::Permissions::from_mode(0o666))?;
        log::info!("Listening on {}", socket_path.display());

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            corrector,
            max_request_bytes: max_request_bytes.max(1),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections forever, one thread per connection.
    pub fn serve(&self) -> Result<()> {
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    log::warn!("Failed to accept connection: {err}");
                    continue;
                }
            };

            let corrector = Arc::clone(&self.corrector);
            let max_request_bytes = self.max_request_bytes;
            thread::spawn(move || {
                if let Err(err) = handle_connection(&corrector, stream, max_request_bytes) {
                    log::debug!("Connection closed with error: {err}");
                }
            });
        }
        Ok(())
    }

    /// Accept and answer exactly one connection on the calling thread.
    pub fn serve_one(&self) -> Result<()> {
        let (stream, _) = self.listener.accept()?;
        handle_connection(&self.corrector, stream, self.max_request_bytes)?;
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.socket_path);
    }
}

/// Read one request, write the correction, close.
pub fn handle_connection(
    corrector: &Corrector,
    mut stream: UnixStream,
    max_request_bytes: usize,
) -> io::Result<()> {
    let mut buffer = vec![0u8; max_request_bytes + 1];
    let read = stream.read(&mut buffer)?;

    if read == 0 {
        return Ok(());
    }
    if read > max_request_bytes {
        log::debug!("Dropping request over {max_request_bytes} bytes");
        return Ok(());
    }

    let request = match std::str::from_utf8(&buffer[..read]) {
        Ok(text) => text,
        Err(err) => {
            log::debug!("Dropping undecodable request: {err}");
            return Ok(());
        }
    };

    let result = corrector.autocorrect(request);
    if result.changed {
        log::info!("Corrected: '{}' -> '{}'", request, result.sentence);
    }
    stream.write_all(result.sentence.as_bytes())?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringParams;
    use crate::confusion::ConfusionSet;
    use crate::gram_store::GramStore;
    use crate::scorer::Scorer;
    use crate::text::test_support::TableKey;
    use crate::text::{CharTokenizer, PhoneticKey};

    fn corrector() -> Arc<Corrector> {
        let mut store = GramStore::new();
        for ch in ["戏", "言", "细", "研"] {
            store.increment(1, ch, 10);
        }
        store.increment(2, "细研", 8);
        let scorer = Scorer::new(store, Box::new(CharTokenizer), ScoringParams::default(), 2);

        let keyer = TableKey::new(&[('戏', "xi"), ('细', "xi"), ('言', "yan"), ('研', "yan")]);
        let mut confusion = ConfusionSet::new();
        confusion.insert(&keyer.key("戏言"), "戏言", 3);
        confusion.insert(&keyer.key("细研"), "细研", 8);

        Arc::new(Corrector::new(scorer, confusion, Box::new(keyer)))
    }

    fn exchange(server: Server, request: &[u8]) -> Vec<u8> {
        let path = server.socket_path().to_path_buf();
        let handle = thread::spawn(move || {
            let _ = server.serve_one();
        });

        let mut client = UnixStream::connect(&path).unwrap();
        client.write_all(request).unwrap();
        // A reset from a dropped request reads as an empty reply.
        let mut response = Vec::new();
        let _ = client.read_to_end(&mut response);
        handle.join().unwrap();
        response
    }

    #[test]
    fn test_round_trip_correction() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::bind(&dir.path().join("c.sock"), corrector(), 2048).unwrap();

        let response = exchange(server, "戏言".as_bytes());
        assert_eq!(String::from_utf8(response).unwrap(), "细研");
    }

    #[test]
    fn test_oversized_request_gets_no_reply() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::bind(&dir.path().join("c.sock"), corrector(), 4).unwrap();

        let response = exchange(server, "戏言戏言".as_bytes());
        assert!(response.is_empty());
    }

    #[test]
    fn test_invalid_utf8_gets_no_reply() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::bind(&dir.path().join("c.sock"), corrector(), 2048).unwrap();

        let response = exchange(server, &[0xff, 0xfe]);
        assert!(response.is_empty());
    }

    #[test]
    fn test_stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        fs::write(&path, b"stale").unwrap();

        let server = Server::bind(&path, corrector(), 2048).unwrap();
        let mode = fs::metadata(server.socket_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o666);
    }
}
