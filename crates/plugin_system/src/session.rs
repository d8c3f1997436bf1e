//! Minimal connection object.
//!
//! The network layer proper lives outside this crate; a [`Session`] carries
//! just enough of a connection for packet dispatch (descriptor and receive
//! buffer) and for plugins to hang data off it.

use crate::hpdata::HpDataList;
use crate::packets::PacketBuffer;
use std::os::raw::c_int;

/// A connection's receive state plus its plugin data.
#[derive(Debug, Default)]
pub struct Session {
    pub fd: c_int,
    rdata: Vec<u8>,
    rpos: usize,
    /// Plugin data attached to this connection.
    pub hdata: HpDataList,
}

impl Session {
    pub fn new(fd: c_int) -> Self {
        Self {
            fd,
            ..Self::default()
        }
    }

    /// Appends received bytes to the buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.rpos > 0 && self.rpos == self.rdata.len() {
            self.rdata.clear();
            self.rpos = 0;
        }
        self.rdata.extend_from_slice(bytes);
    }

    /// Bytes consumed so far from the current buffer.
    pub fn consumed(&self) -> usize {
        self.rpos
    }
}

impl PacketBuffer for Session {
    fn fd(&self) -> c_int {
        self.fd
    }

    fn remaining(&self) -> &[u8] {
        &self.rdata[self.rpos..]
    }

    fn skip(&mut self, len: usize) {
        self.rpos = (self.rpos + len).min(self.rdata.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_and_skip() {
        let mut session = Session::new(9);
        session.feed(&[1, 2, 3]);
        session.skip(2);
        assert_eq!(session.remaining(), &[3]);
        assert_eq!(session.consumed(), 2);

        session.skip(10);
        assert!(session.remaining().is_empty());

        // A fully drained buffer is recycled on the next feed.
        session.feed(&[4, 5]);
        assert_eq!(session.consumed(), 0);
        assert_eq!(session.remaining(), &[4, 5]);
        assert_eq!(session.fd(), 9);
    }
}
