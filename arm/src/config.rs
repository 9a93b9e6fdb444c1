//! Runtime prover configuration.

use crate::{
    error::ArmError,
    proving_system::{DevProver, ProofType, ProvingBackend},
};
use std::env;
use tracing::{info, warn};

pub const DEV_MODE_ENV: &str = "RISC0_DEV_MODE";
pub const DEV_PROVER_KEY_ENV: &str = "ARM_DEV_PROVER_KEY";
pub const PROOF_TYPE_ENV: &str = "ARM_PROOF_TYPE";

const DEFAULT_DEV_KEY: [u8; 32] = *b"anoma-resource-machine-dev-key!!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProverConfig {
    /// Use the in-process development prover.
    pub dev_mode: bool,
    /// Key of the development prover's seals.
    pub dev_key: [u8; 32],
    /// Proof type requested when callers do not pick one.
    pub proof_type: ProofType,
}

impl Default for ProverConfig {
    fn default() -> Self {
        ProverConfig {
            dev_mode: !cfg!(feature = "prove"),
            dev_key: DEFAULT_DEV_KEY,
            proof_type: ProofType::default(),
        }
    }
}

impl ProverConfig {
    pub fn from_env() -> Result<Self, ArmError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ArmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ProverConfig::default();

        if let Some(value) = lookup(DEV_MODE_ENV) {
            config.dev_mode = match value.trim() {
                "1" | "true" | "TRUE" | "yes" => true,
                "0" | "false" | "FALSE" | "no" | "" => config.dev_mode,
                other => {
                    return Err(ArmError::InvalidConfig(format!(
                        "{} must be a boolean, got `{}`",
                        DEV_MODE_ENV, other
                    )))
                }
            };
        }

        if let Some(value) = lookup(DEV_PROVER_KEY_ENV) {
            let bytes = hex::decode(value.trim()).map_err(|err| {
                ArmError::InvalidConfig(format!("{} is not hex: {}", DEV_PROVER_KEY_ENV, err))
            })?;
            config.dev_key = bytes.try_into().map_err(|_| {
                ArmError::InvalidConfig(format!("{} must be 32 bytes", DEV_PROVER_KEY_ENV))
            })?;
        }

        if let Some(value) = lookup(PROOF_TYPE_ENV) {
            config.proof_type = ProofType::parse(&value)?;
        }

        Ok(config)
    }

    /// Instantiates the backend this configuration selects.
    pub fn backend(&self) -> Box<dyn ProvingBackend> {
        if self.dev_mode {
            if self.dev_key == DEFAULT_DEV_KEY {
                warn!("development prover uses the built-in key, proofs are forgeable");
            }
            info!(proof_type = ?self.proof_type, "using development prover");
            return Box::new(DevProver::new(self.dev_key));
        }

        #[cfg(feature = "prove")]
        {
            info!(proof_type = ?self.proof_type, "using zkVM prover");
            warn!(
                "built-in compliance and aggregation programs carry no ELF and cannot be proved \
                 by the zkVM prover; set {}=1 to use the development prover",
                DEV_MODE_ENV
            );
            Box::new(crate::risc0_prover::Risc0Prover)
        }

        #[cfg(not(feature = "prove"))]
        {
            warn!("zkVM prover not compiled in, using development prover");
            Box::new(DevProver::new(self.dev_key))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProverConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ProverConfig::default());
    }

    #[test]
    fn test_overrides() {
        let key = "11".repeat(32);
        let config = ProverConfig::from_lookup(lookup(&[
            (DEV_MODE_ENV, "1"),
            (DEV_PROVER_KEY_ENV, &key),
            (PROOF_TYPE_ENV, "groth16"),
        ]))
        .unwrap();
        assert!(config.dev_mode);
        assert_eq!(config.dev_key, [0x11u8; 32]);
        assert_eq!(config.proof_type, ProofType::Groth16);
        assert_eq!(config.backend().name(), "dev");
    }

    #[test]
    fn test_invalid_values() {
        for vars in [
            vec![(DEV_MODE_ENV, "maybe")],
            vec![(DEV_PROVER_KEY_ENV, "zz")],
            vec![(DEV_PROVER_KEY_ENV, "1122")],
            vec![(PROOF_TYPE_ENV, "plonk")],
        ] {
            assert!(matches!(
                ProverConfig::from_lookup(lookup(&vars)),
                Err(ArmError::InvalidConfig(_))
            ));
        }
    }

    #[cfg(feature = "prove")]
    #[test]
    fn test_zkvm_backend_warns_about_missing_elfs() {
        use std::{
            io,
            sync::{Arc, Mutex},
        };

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Captured {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let config = ProverConfig::from_lookup(lookup(&[(DEV_MODE_ENV, "0")])).unwrap();
        let backend = tracing::subscriber::with_default(subscriber, || config.backend());
        assert_eq!(backend.name(), "risc0");

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("WARN"));
        assert!(logs.contains(DEV_MODE_ENV));
    }
}
