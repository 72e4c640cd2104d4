/// Associative array keyed by 1–4 value tuples.
///
/// Open-addressed linear probing, 2× growth at 3/4 load (tombstones count
/// toward the trigger and are swept by the rebuild). Hashing mixes the type
/// tag with tag-specific content hashes using fixed seeds: iteration and
/// hash order are deterministic within a run, and nothing more is promised.
use crate::core::value::{deep_eq, value_hash, Value};

#[derive(Clone, Debug)]
enum Slot {
    Empty,
    Tomb,
    Full { hash: u64, keys: Vec<Value>, value: Value },
}

#[derive(Clone, Debug)]
pub struct Assoc {
    slots: Vec<Slot>,
    live: usize,
    used: usize, // live + tombstones
}

const INITIAL_CAP: usize = 16;

impl Default for Assoc {
    fn default() -> Self {
        Assoc::new()
    }
}

impl Assoc {
    pub fn new() -> Self {
        Assoc {
            slots: (0..INITIAL_CAP).map(|_| Slot::Empty).collect(),
            live: 0,
            used: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn hash_keys(keys: &[Value]) -> u64 {
        let mut h: u64 = 0x100_0193;
        for k in keys {
            h ^= value_hash(k);
            h = h.wrapping_mul(0x1000_0000_01b3);
        }
        h | 1
    }

    fn probe(&self, hash: u64, keys: &[Value]) -> Result<usize, usize> {
        // Ok(i): found at i. Err(i): insertion slot.
        let mask = self.slots.len() - 1;
        let mut i = (hash as usize) & mask;
        let mut first_tomb: Option<usize> = None;
        loop {
            match &self.slots[i] {
                Slot::Empty => return Err(first_tomb.unwrap_or(i)),
                Slot::Tomb => {
                    if first_tomb.is_none() {
                        first_tomb = Some(i);
                    }
                }
                Slot::Full { hash: h, keys: k, .. } => {
                    if *h == hash && k.len() == keys.len() && k.iter().zip(keys).all(|(a, b)| deep_eq(a, b)) {
                        return Ok(i);
                    }
                }
            }
            i = (i + 1) & mask;
        }
    }

    pub fn get(&self, keys: &[Value]) -> Option<&Value> {
        let hash = Self::hash_keys(keys);
        match self.probe(hash, keys) {
            Ok(i) => match &self.slots[i] {
                Slot::Full { value, .. } => Some(value),
                _ => unreachable!("probe returned a non-full slot"),
            },
            Err(_) => None,
        }
    }

    pub fn set(&mut self, keys: Vec<Value>, value: Value) {
        if (self.used + 1) * 4 > self.slots.len() * 3 {
            self.grow();
        }
        let hash = Self::hash_keys(&keys);
        match self.probe(hash, &keys) {
            Ok(i) => {
                if let Slot::Full { value: v, .. } = &mut self.slots[i] {
                    *v = value;
                }
            }
            Err(i) => {
                if !matches!(self.slots[i], Slot::Tomb) {
                    self.used += 1;
                }
                self.slots[i] = Slot::Full { hash, keys, value };
                self.live += 1;
            }
        }
    }

    pub fn remove(&mut self, keys: &[Value]) -> Option<Value> {
        let hash = Self::hash_keys(keys);
        match self.probe(hash, keys) {
            Ok(i) => {
                let old = std::mem::replace(&mut self.slots[i], Slot::Tomb);
                self.live -= 1;
                match old {
                    Slot::Full { value, .. } => Some(value),
                    _ => None,
                }
            }
            Err(_) => None,
        }
    }

    fn grow(&mut self) {
        let new_cap = self.slots.len() * 2;
        let old = std::mem::replace(
            &mut self.slots,
            (0..new_cap).map(|_| Slot::Empty).collect(),
        );
        self.live = 0;
        self.used = 0;
        for slot in old {
            if let Slot::Full { keys, value, .. } = slot {
                self.set(keys, value);
            }
        }
    }

    /// Bucket-order iteration: stable within a run.
    pub fn iter(&self) -> impl Iterator<Item = (&[Value], &Value)> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Full { keys, value, .. } => Some((keys.as_slice(), value)),
            _ => None,
        })
    }
}
