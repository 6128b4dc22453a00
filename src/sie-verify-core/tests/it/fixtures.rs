//! Shared fixtures: a temporary world with a root key, an issuer, a signed
//! registry, a keyring, and a throwaway HTTP server for remote registries.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use sie_crypto::{b64_encode, sha256_hex, ClassicalSigner, Ed25519Signer};
use sie_verify_core::registry::{REGISTRY_FILE, ROOT_KEY_FILE, SIGNATURE_FILE};
use sie_verify_core::{
    codec, EnforcementEngine, EnforcementMode, Envelope, EnvelopeVerifier, Payload,
    RegistryClient, RegistryConfig, CHANNEL_INSTRUCTION,
};
use tempfile::TempDir;

pub const ISSUER: &str = "acme-skills";

pub fn issuer_record(issuer_id: &str, public_key: &str) -> Value {
    json!({"type": "issuer", "issuer_id": issuer_id, "public_key": public_key})
}

pub fn revocation_record(issuer_id: &str, revoked_key: &str) -> Value {
    json!({"type": "revocation", "issuer_id": issuer_id, "revoked_key": revoked_key})
}

/// Raw snapshot bytes, base64 signature and base64 root key.
pub struct Artifacts {
    pub registry: Vec<u8>,
    pub signature: String,
    pub root_key: String,
}

impl Artifacts {
    pub fn write_to(&self, dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(REGISTRY_FILE), &self.registry).unwrap();
        std::fs::write(dir.join(SIGNATURE_FILE), &self.signature).unwrap();
        std::fs::write(dir.join(ROOT_KEY_FILE), &self.root_key).unwrap();
    }

    /// Files as served under `/registry/`.
    pub fn routes(&self) -> HashMap<String, Vec<u8>> {
        let mut routes = HashMap::new();
        routes.insert(format!("/registry/{}", REGISTRY_FILE), self.registry.clone());
        routes.insert(
            format!("/registry/{}", SIGNATURE_FILE),
            self.signature.clone().into_bytes(),
        );
        routes.insert(
            format!("/registry/{}", ROOT_KEY_FILE),
            self.root_key.clone().into_bytes(),
        );
        routes
    }
}

pub struct World {
    pub dir: TempDir,
    pub root: Ed25519Signer,
    pub issuer: Ed25519Signer,
}

impl World {
    /// Issuer present in the registry and trusted in the keyring.
    pub fn new() -> Self {
        let world = Self {
            dir: tempfile::tempdir().unwrap(),
            root: Ed25519Signer::from_seed(&[11u8; 32]).unwrap(),
            issuer: Ed25519Signer::from_seed(&[22u8; 32]).unwrap(),
        };
        let key = world.issuer.public_key_b64();
        world.write_registry(&[issuer_record(ISSUER, &key)]);
        world.write_keyring(&[(ISSUER, key)]);
        world
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn registry_dir(&self) -> PathBuf {
        self.path().join("registry")
    }

    pub fn keyring(&self) -> PathBuf {
        self.path().join("trusted_issuers.json")
    }

    pub fn issuer_key(&self) -> String {
        self.issuer.public_key_b64()
    }

    pub fn artifacts(&self, records: &[Value]) -> Artifacts {
        let registry = serde_json::to_vec(&json!({ "records": records })).unwrap();
        let signature = b64_encode(&self.root.sign(&registry).unwrap());
        Artifacts {
            registry,
            signature,
            root_key: self.root.public_key_b64(),
        }
    }

    pub fn write_registry(&self, records: &[Value]) {
        self.artifacts(records).write_to(&self.registry_dir());
    }

    pub fn write_keyring(&self, entries: &[(&str, String)]) {
        let map: Map<String, Value> = entries
            .iter()
            .map(|(id, key)| (id.to_string(), Value::String(key.clone())))
            .collect();
        std::fs::write(self.keyring(), Value::Object(map).to_string()).unwrap();
    }

    pub fn envelope(&self, content: &str, sha256: Option<String>) -> Envelope {
        let mut env = Envelope {
            issuer: Some(ISSUER.into()),
            id: "skill-001".into(),
            channel: Some(CHANNEL_INSTRUCTION.into()),
            payload: Payload {
                name: Some("SKILL.md".into()),
                content: content.into(),
                sha256,
                issuer: None,
            },
            constraints: Map::new(),
            scope: vec!["summarize".into()],
            signature: String::new(),
        };
        codec::sign(&mut env, &self.issuer).unwrap();
        env
    }

    /// Write a skill file without an envelope.
    pub fn unsigned_skill(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Write a skill file and a bound, signed envelope next to it.
    pub fn signed_skill(&self, name: &str, content: &str) -> PathBuf {
        let path = self.unsigned_skill(name, content);
        let env = self.envelope(content, Some(sha256_hex(content.as_bytes())));
        self.write_envelope(&path, &env);
        path
    }

    pub fn write_envelope(&self, skill: &Path, env: &Envelope) {
        let mut envelope_path = skill.as_os_str().to_owned();
        envelope_path.push(".sie.json");
        std::fs::write(PathBuf::from(envelope_path), env.to_json_pretty().unwrap()).unwrap();
    }

    pub fn verifier(&self) -> EnvelopeVerifier {
        EnvelopeVerifier::new(RegistryClient::new(RegistryConfig::offline(
            self.registry_dir(),
        )))
    }

    pub fn engine(&self, mode: EnforcementMode) -> EnforcementEngine {
        EnforcementEngine::new(mode, self.keyring(), ".sie.json", self.verifier())
    }
}

/// Minimal HTTP/1.1 server answering GETs from a fixed route table.
pub struct StaticServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl StaticServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub fn serve(routes: HashMap<String, Vec<u8>>) -> StaticServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            loop {
                let mut header = String::new();
                match reader.read_line(&mut header) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if header == "\r\n" || header == "\n" => break,
                    Ok(_) => {},
                }
            }

            counter.fetch_add(1, Ordering::SeqCst);
            let path = request_line.split_whitespace().nth(1).unwrap_or("/");
            let (status, body) = match routes.get(path) {
                Some(body) => ("200 OK", body.clone()),
                None => ("404 Not Found", b"not found".to_vec()),
            };

            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
        }
    });

    StaticServer { base_url, hits }
}

/// A URL on which nothing is listening.
pub fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
