//! Per-connection state machine. Pure and I/O-free: it is fed raw bytes and
//! a [`Storage`] reference and produces response bytes, so any driver —
//! blocking thread-per-connection, a Tokio task, a hand-rolled epoll loop —
//! can push it forward.

use bytes::{Bytes, BytesMut};
use kvcache_proto::command::ERROR_RESPONSE;
use kvcache_proto::{Command, Parser};
use kvcache_store::Storage;
use std::collections::VecDeque;

/// Stop reading once this many responses are queued, resume once drained
/// back to [`BACKPRESSURE_LOW`].
const BACKPRESSURE_HIGH: usize = 256;
const BACKPRESSURE_LOW: usize = 32;

pub struct ConnectionMachine {
    rbuf: BytesMut,
    parser: Parser,
    /// `Some((command, arg_bytes_remaining))` while a storage command is
    /// waiting on its body.
    pending: Option<(Command, usize)>,
    arg_buf: Vec<u8>,
    responses: VecDeque<Bytes>,
    write_pos: usize,
    alive: bool,
    /// Set once the queue hits [`BACKPRESSURE_HIGH`], cleared once it drains
    /// back to [`BACKPRESSURE_LOW`] — the hysteresis keeps a queue hovering
    /// right at the high-water mark from flapping reads on and off.
    paused: bool,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMachine {
    pub fn new() -> Self {
        Self {
            rbuf: BytesMut::with_capacity(4096),
            parser: Parser::new(),
            pending: None,
            arg_buf: Vec::new(),
            responses: VecDeque::new(),
            write_pos: 0,
            alive: true,
            paused: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Eligible for teardown once not alive and fully drained.
    pub fn is_done(&self) -> bool {
        !self.alive && self.responses.is_empty()
    }

    /// Readiness mask includes write iff responses are queued.
    pub fn wants_write(&self) -> bool {
        !self.responses.is_empty()
    }

    /// Backpressure: stop reading once saturated, resume below the
    /// low-water mark.
    pub fn wants_read(&self) -> bool {
        self.alive && !self.paused
    }

    fn queue_saturated(&self) -> bool {
        self.responses.len() >= BACKPRESSURE_HIGH
    }

    /// Stop accepting new input on close or error; let queued responses
    /// drain.
    pub fn mark_closing(&mut self) {
        self.alive = false;
    }

    /// Feed newly read bytes, parse/accumulate/execute as many complete
    /// commands as the buffer holds, queuing their responses in
    /// pipelining order.
    pub fn on_readable(&mut self, chunk: &[u8], storage: &dyn Storage) {
        self.rbuf.extend_from_slice(chunk);

        loop {
            if self.queue_saturated() {
                self.paused = true;
                break;
            }

            if self.pending.is_none() {
                let (consumed, complete) = self.parser.parse(&self.rbuf);
                if consumed > 0 {
                    let _ = self.rbuf.split_to(consumed);
                }
                if !complete {
                    break; // need more bytes
                }
                match self.parser.build() {
                    Ok((cmd, arg_len)) => {
                        let arg_remains = if arg_len > 0 { arg_len + 2 } else { 0 };
                        self.arg_buf.clear();
                        self.pending = Some((cmd, arg_remains));
                    }
                    Err(_) => {
                        self.responses.push_back(Bytes::from_static(ERROR_RESPONSE));
                        self.parser.reset();
                        continue;
                    }
                }
            }

            if let Some((_, arg_remains)) = self.pending.as_mut() {
                if *arg_remains > 0 {
                    let take = (*arg_remains).min(self.rbuf.len());
                    if take > 0 {
                        self.arg_buf.extend_from_slice(&self.rbuf[..take]);
                        let _ = self.rbuf.split_to(take);
                        *arg_remains -= take;
                    }
                }
            }

            if matches!(self.pending, Some((_, 0))) {
                let (cmd, _) = self.pending.take().expect("checked Some above");
                let resp = cmd.execute(&self.arg_buf, storage);
                self.responses.push_back(Bytes::from(resp));
                self.arg_buf.clear();
                self.parser.reset();
                continue;
            }

            break; // waiting on more argument bytes, or input exhausted
        }
    }

    /// The next slice of bytes a writer should send, a zero-copy view into
    /// the front-most queued response starting at `write_pos`. `None` once
    /// the queue is drained.
    pub fn next_write_chunk(&self) -> Option<Bytes> {
        self.responses.front().map(|r| r.slice(self.write_pos..))
    }

    /// Advance past `n` written bytes, popping fully-written responses.
    pub fn advance_write(&mut self, mut n: usize) {
        while n > 0 {
            let Some(front) = self.responses.front() else {
                break;
            };
            let remaining = front.len() - self.write_pos;
            if n >= remaining {
                n -= remaining;
                self.responses.pop_front();
                self.write_pos = 0;
            } else {
                self.write_pos += n;
                n = 0;
            }
        }
        if self.paused && self.responses.len() <= BACKPRESSURE_LOW {
            self.paused = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvcache_store::SimpleLru;

    fn take_all_responses(c: &mut ConnectionMachine) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(front) = c.responses.front().cloned() {
            out.extend_from_slice(&front[c.write_pos..]);
            c.advance_write(front.len() - c.write_pos);
        }
        out
    }

    #[test]
    fn basic_set_get_scenario() {
        let store = SimpleLru::new(1024);
        let mut c = ConnectionMachine::new();
        c.on_readable(b"set foo 0 0 3\r\nbar\r\n", &store);
        c.on_readable(b"get foo\r\n", &store);
        let out = take_all_responses(&mut c);
        assert_eq!(out, b"STORED\r\nVALUE foo 0 3\r\nbar\r\nEND\r\n");
    }

    #[test]
    fn pipelined_commands_split_across_reads() {
        let store = SimpleLru::new(1024);
        let mut c = ConnectionMachine::new();
        c.on_readable(b"set a 0 0 1\r\nA", &store);
        c.on_readable(b"\r\nset b 0 0 1\r\nB\r\n", &store);
        let out = take_all_responses(&mut c);
        assert_eq!(out, b"STORED\r\nSTORED\r\n");
    }

    #[test]
    fn byte_at_a_time_feeding_still_progresses() {
        let store = SimpleLru::new(1024);
        let mut c = ConnectionMachine::new();
        let input = b"set k 0 0 2\r\nhi\r\n";
        for &byte in input {
            c.on_readable(&[byte], &store);
        }
        let out = take_all_responses(&mut c);
        assert_eq!(out, b"STORED\r\n");
    }

    #[test]
    fn unknown_verb_yields_error_and_recovers() {
        let store = SimpleLru::new(1024);
        let mut c = ConnectionMachine::new();
        c.on_readable(b"bogus\r\nget foo\r\n", &store);
        let out = take_all_responses(&mut c);
        assert_eq!(out, b"ERROR\r\nEND\r\n");
    }

    #[test]
    fn close_after_drain() {
        let store = SimpleLru::new(1024);
        let mut c = ConnectionMachine::new();
        c.on_readable(b"delete x\r\n", &store);
        c.mark_closing();
        assert!(!c.is_done()); // response still queued
        take_all_responses(&mut c);
        assert!(c.is_done());
    }

    #[test]
    fn backpressure_has_hysteresis_between_high_and_low() {
        let store = SimpleLru::new(1 << 20);
        let mut c = ConnectionMachine::new();

        let mut pipeline = Vec::new();
        for _ in 0..BACKPRESSURE_HIGH {
            pipeline.extend_from_slice(b"delete x\r\n");
        }
        c.on_readable(&pipeline, &store);
        assert_eq!(c.responses.len(), BACKPRESSURE_HIGH);
        assert!(!c.wants_read(), "must pause once the high-water mark is hit");

        // Draining down to just above the low-water mark must not resume
        // reads yet — only crossing below BACKPRESSURE_LOW should.
        let above_low = c.responses.len() - BACKPRESSURE_LOW - 1;
        for _ in 0..above_low {
            let chunk = c.next_write_chunk().unwrap();
            let len = chunk.len();
            c.advance_write(len);
        }
        assert!(!c.wants_read(), "still above the low-water mark");

        while c.responses.len() > BACKPRESSURE_LOW {
            let chunk = c.next_write_chunk().unwrap();
            let len = chunk.len();
            c.advance_write(len);
        }
        assert!(c.wants_read(), "must resume once drained to the low-water mark");
    }
}
