//! Circuit programs and the environment they run in.

use crate::{
    error::ArmError,
    resource_logic::LogicCircuit,
    utils::{to_words, words_to_bytes},
};
use risc0_zkvm::Digest;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// A circuit identified by a fixed 256-bit image id.
///
/// `execute` is the native rendition of the guest: it reads the witness from
/// the environment, enforces the constraints, `verify`s the claims it
/// recursively depends on and commits its public instance.
pub trait Program: Send + Sync {
    fn name(&self) -> &str;

    fn image_id(&self) -> Digest;

    /// The zkVM binary, when the program has been compiled for one.
    fn elf(&self) -> Option<&[u8]> {
        None
    }

    fn execute(&self, env: &mut GuestEnv) -> Result<(), ArmError>;
}

/// The guest-side view of a proving run.
#[derive(Debug, Default)]
pub struct GuestEnv {
    input: Vec<Vec<u32>>,
    cursor: usize,
    claims: Vec<(Digest, Vec<u8>)>,
    journal: Vec<u32>,
}

impl GuestEnv {
    /// `claims` are the `(image id, journal)` pairs of assumptions the prover
    /// has already checked.
    pub fn new(input: Vec<Vec<u32>>, claims: Vec<(Digest, Vec<u8>)>) -> Self {
        GuestEnv {
            input,
            cursor: 0,
            claims,
            journal: Vec::new(),
        }
    }

    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T, ArmError> {
        let frame = self
            .input
            .get(self.cursor)
            .ok_or(ArmError::ReadWitnessFailed)?;
        self.cursor += 1;
        risc0_zkvm::serde::from_slice::<T, u32>(frame).map_err(|_| ArmError::ReadWitnessFailed)
    }

    /// Checks that the prover supplied a proof of `journal` under `image_id`.
    pub fn verify(&self, image_id: &Digest, journal: &[u8]) -> Result<(), ArmError> {
        if self
            .claims
            .iter()
            .any(|(id, claim_journal)| id == image_id && claim_journal == journal)
        {
            trace!(%image_id, "resolved assumption");
            Ok(())
        } else {
            Err(ArmError::ProveFailed(format!(
                "unresolved assumption for program {}",
                image_id
            )))
        }
    }

    pub fn commit<T: Serialize>(&mut self, value: &T) -> Result<(), ArmError> {
        self.journal.extend(to_words(value)?);
        Ok(())
    }

    pub fn journal(&self) -> &[u8] {
        words_to_bytes(&self.journal)
    }
}

/// Turns any [LogicCircuit] into a [Program]: the witness is read, constrained
/// and the resulting logic instance committed.
pub struct CircuitProgram<W> {
    name: &'static str,
    image_id: Digest,
    elf: Option<&'static [u8]>,
    _witness: PhantomData<fn() -> W>,
}

impl<W> CircuitProgram<W> {
    pub const fn new(name: &'static str, image_id: Digest) -> Self {
        CircuitProgram {
            name,
            image_id,
            elf: None,
            _witness: PhantomData,
        }
    }

    pub fn with_elf(mut self, elf: &'static [u8]) -> Self {
        self.elf = Some(elf);
        self
    }
}

impl<W: LogicCircuit> Program for CircuitProgram<W> {
    fn name(&self) -> &str {
        self.name
    }

    fn image_id(&self) -> Digest {
        self.image_id
    }

    fn elf(&self) -> Option<&[u8]> {
        self.elf
    }

    fn execute(&self, env: &mut GuestEnv) -> Result<(), ArmError> {
        let witness: W = env.read()?;
        let instance = witness.constrain()?;
        env.commit(&instance)
    }
}

/// Lookup of programs by image id.
#[derive(Clone, Default)]
pub struct ProgramRegistry {
    programs: HashMap<Digest, Arc<dyn Program>>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, program: Arc<dyn Program>) -> &mut Self {
        self.programs.insert(program.image_id(), program);
        self
    }

    pub fn get(&self, image_id: &Digest) -> Result<Arc<dyn Program>, ArmError> {
        self.programs
            .get(image_id)
            .cloned()
            .ok_or(ArmError::UnknownProgram(*image_id))
    }

    pub fn contains(&self, image_id: &Digest) -> bool {
        self.programs.contains_key(image_id)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;

    #[test]
    fn test_guest_env_reads_in_order() {
        let input = vec![to_words(&7u32).unwrap(), to_words(&(true, 9u64)).unwrap()];
        let mut env = GuestEnv::new(input, Vec::new());
        assert_eq!(env.read::<u32>().unwrap(), 7);
        assert_eq!(env.read::<(bool, u64)>().unwrap(), (true, 9));
        assert_eq!(env.read::<u32>(), Err(ArmError::ReadWitnessFailed));
    }

    #[test]
    fn test_guest_env_assumptions() {
        let id = hash_bytes(b"program");
        let env = GuestEnv::new(Vec::new(), vec![(id, vec![1, 2, 3, 4])]);
        assert!(env.verify(&id, &[1, 2, 3, 4]).is_ok());
        assert!(env.verify(&id, &[1, 2, 3, 5]).is_err());
        assert!(env.verify(&hash_bytes(b"other"), &[1, 2, 3, 4]).is_err());
    }
}
