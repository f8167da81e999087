use rand::RngCore;

// MT19937 period parameters
const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;

/// Constant last element of every stream seed key
const KEY_SALT: u32 = 5437;

/// 32-bit Mersenne Twister (MT19937, 2002 initialization).
///
/// A single generator is shared by every random source of a simulation and
/// reseeded from a derived key before each source pre-generates its variates,
/// so draws are a pure function of the key and the call sequence since.
#[derive(Clone)]
pub struct Mt19937 {
    state: Box<[u32; N]>,
    index: usize,
}

impl Mt19937 {
    /// Generator seeded with the reference default seed (5489)
    pub fn new() -> Self {
        Self::from_seed_u32(5489)
    }

    pub fn from_seed_u32(seed: u32) -> Self {
        let mut rng = Self {
            state: Box::new([0; N]),
            index: N,
        };
        rng.seed_u32(seed);
        rng
    }

    pub fn from_key(key: &[u32]) -> Self {
        let mut rng = Self::new();
        rng.seed_by_array(key);
        rng
    }

    /// Reinitialize the state from a single 32-bit seed (`init_genrand`)
    pub fn seed_u32(&mut self, seed: u32) {
        self.state[0] = seed;
        for i in 1..N {
            let prev = self.state[i - 1] ^ (self.state[i - 1] >> 30);
            self.state[i] = 1_812_433_253u32
                .wrapping_mul(prev)
                .wrapping_add(i as u32);
        }
        self.index = N;
    }

    /// Reinitialize the state from a key array (`init_by_array`).
    /// The result depends on both the values and their order.
    pub fn seed_by_array(&mut self, key: &[u32]) {
        self.seed_u32(19_650_218);
        if key.is_empty() {
            return;
        }

        let mut i = 1;
        let mut j = 0;
        for _ in 0..N.max(key.len()) {
            let prev = self.state[i - 1] ^ (self.state[i - 1] >> 30);
            self.state[i] = (self.state[i] ^ prev.wrapping_mul(1_664_525))
                .wrapping_add(key[j])
                .wrapping_add(j as u32);
            i += 1;
            j += 1;
            if i >= N {
                self.state[0] = self.state[N - 1];
                i = 1;
            }
            if j >= key.len() {
                j = 0;
            }
        }
        for _ in 0..N - 1 {
            let prev = self.state[i - 1] ^ (self.state[i - 1] >> 30);
            self.state[i] = (self.state[i] ^ prev.wrapping_mul(1_566_083_941)).wrapping_sub(i as u32);
            i += 1;
            if i >= N {
                self.state[0] = self.state[N - 1];
                i = 1;
            }
        }

        // MSB is 1, assuring a non-zero initial state
        self.state[0] = 0x8000_0000;
        self.index = N;
    }

    fn twist(&mut self) {
        let mag01 = |y: u32| if y & 1 == 0 { 0 } else { MATRIX_A };

        for kk in 0..N - M {
            let y = (self.state[kk] & UPPER_MASK) | (self.state[kk + 1] & LOWER_MASK);
            self.state[kk] = self.state[kk + M] ^ (y >> 1) ^ mag01(y);
        }
        for kk in N - M..N - 1 {
            let y = (self.state[kk] & UPPER_MASK) | (self.state[kk + 1] & LOWER_MASK);
            self.state[kk] = self.state[kk + M - N] ^ (y >> 1) ^ mag01(y);
        }
        let y = (self.state[N - 1] & UPPER_MASK) | (self.state[0] & LOWER_MASK);
        self.state[N - 1] = self.state[M - 1] ^ (y >> 1) ^ mag01(y);

        self.index = 0;
    }

    /// Next tempered output on [0, 0xffffffff] (`genrand_int32`)
    pub fn next_word(&mut self) -> u32 {
        if self.index >= N {
            self.twist();
        }

        let mut y = self.state[self.index];
        self.index += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^= y >> 18;
        y
    }

    /// Uniform draw strictly inside (0, 1) (`genrand_real3`)
    pub fn next_uniform_open(&mut self) -> f64 {
        uniform_open(self)
    }
}

impl Default for Mt19937 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Mt19937 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mt19937").field("index", &self.index).finish()
    }
}

impl RngCore for Mt19937 {
    fn next_u32(&mut self) -> u32 {
        self.next_word()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_word() as u64;
        let lo = self.next_word() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_word().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Map one 32-bit output of any generator onto the open interval (0, 1).
/// Every variate in the crate consumes exactly one call to this.
pub fn uniform_open<R: RngCore + ?Sized>(rng: &mut R) -> f64 {
    (rng.next_u32() as f64 + 0.5) * (1.0 / 4_294_967_296.0)
}

/// Logical random sources of a network, each reseeded independently per run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamTag {
    Arrivals,
    ArrivalRouting,
    Service(usize),
    OnwardRouting(usize),
}

impl StreamTag {
    /// Integer tag used in the seed key
    pub fn code(self) -> i64 {
        match self {
            StreamTag::Arrivals => -2,
            StreamTag::ArrivalRouting => -1,
            StreamTag::Service(queue) => 2 * queue as i64,
            StreamTag::OnwardRouting(queue) => 2 * queue as i64 + 1,
        }
    }

    /// Seed key for this source in replication `run` under `base_seed`.
    /// Elements are taken modulo 2^32, so negative tags wrap.
    pub fn key(self, base_seed: u64, run: usize) -> [u32; 4] {
        [base_seed as u32, run as u32, self.code() as u32, KEY_SALT]
    }
}
