use crate::{Error, Result};

/// Capacity of the host receive queue.
pub const RX_BUF_SIZE: usize = 256;

/// What `enqueue` does when every slot holds an unread entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the oldest unread entry and store the new one.
    #[default]
    Overwrite,
    /// Leave the queue untouched and return `Error::CapacityExceeded`.
    Reject,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "reject" => Ok(Self::Reject),
            _ => Err(format!("unknown overflow policy '{s}'; expected overwrite or reject")),
        }
    }
}

/// Fixed-capacity circular queue.
///
/// `head` is the next write index and `tail` the next read index, both in
/// `[0, N)`. A length counter tells a full queue apart from an empty one, so
/// all `N` slots are usable. The availability flag mirrors `len > 0`.
#[derive(Debug, Clone)]
pub struct RingQueue<T, const N: usize> {
    buf: [T; N],
    head: usize,
    tail: usize,
    len: usize,
    flag: bool,
    policy: OverflowPolicy,
    overwritten: u64,
}

pub type ByteQueue = RingQueue<u8, RX_BUF_SIZE>;

impl<T: Copy + Default, const N: usize> Default for RingQueue<T, N> {
    fn default() -> Self {
        Self::new(OverflowPolicy::default())
    }
}

impl<T: Copy + Default, const N: usize> RingQueue<T, N> {
    pub fn new(policy: OverflowPolicy) -> Self {
        assert!(N > 0, "queue capacity must be non-zero");
        Self {
            buf: [T::default(); N],
            head: 0,
            tail: 0,
            len: 0,
            flag: false,
            policy,
            overwritten: 0,
        }
    }

    /// Zero the indices and clear the flag. Stored values are left in place
    /// but become unreachable.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
        self.flag = false;
    }

    pub fn enqueue(&mut self, item: T) -> Result<()> {
        if self.len == N {
            match self.policy {
                OverflowPolicy::Reject => {
                    return Err(Error::CapacityExceeded { capacity: N });
                }
                OverflowPolicy::Overwrite => {
                    // head == tail here; the write below lands on the oldest entry
                    self.tail = (self.tail + 1) % N;
                    self.len -= 1;
                    self.overwritten += 1;
                    log::trace!("queue full, overwrote oldest entry");
                }
            }
        }

        self.buf[self.head] = item;
        self.head = (self.head + 1) % N;
        self.len += 1;
        self.flag = true;
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.buf[self.tail];
        self.tail = (self.tail + 1) % N;
        self.len -= 1;
        if self.len == 0 {
            self.flag = false;
        }
        Some(item)
    }

    pub fn poll_flag(&self) -> bool {
        self.flag
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Number of unread entries lost to `OverflowPolicy::Overwrite`.
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }
}
