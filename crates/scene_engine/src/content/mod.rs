//! Content loading
//!
//! A [`Processor`] turns a byte stream into a typed resource and back. The
//! [`ContentManager`] picks the processor by file extension and caches every
//! loaded resource under `(processor, path)` with an owner count: loading a
//! cached path hands out the processor's duplicate of the cached value, and
//! [`ContentManager::release`] frees the entry when its last owner is gone.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::render::ShaderSource;

/// Type-erased loaded resource
pub type Resource = Arc<dyn Any + Send + Sync>;

/// Processor arguments
pub type ContentArgs = BTreeMap<String, String>;

/// Content errors
#[derive(thiserror::Error, Debug)]
pub enum ContentError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No processor handles the extension
    #[error("No processor for '{0}'")]
    NoProcessor(String),

    /// The processor rejected the stream
    #[error("Failed to deserialize '{0}'")]
    Deserialize(String),

    /// The processor could not write the resource
    #[error("Failed to serialize '{0}'")]
    Serialize(String),

    /// The cached resource is of another type
    #[error("Resource '{0}' has a different type")]
    TypeMismatch(String),

    /// The path is cached from another byte range
    #[error("Resource '{0}' is cached from a different byte range")]
    RangeMismatch(String),
}

/// Converter between a byte stream and one resource type
pub trait Processor: Send + Sync {
    /// Unique processor name
    fn name(&self) -> &str;

    /// File extensions (without dot) handled by this processor
    fn extensions(&self) -> &[&str];

    /// Read a resource of `length` bytes that starts `offset` bytes into
    /// its container; the stream is already positioned at the start
    fn deserialize(
        &self,
        stream: &mut dyn Read,
        length: u64,
        offset: u64,
        args: &ContentArgs,
    ) -> Option<Resource>;

    /// Write a resource; false when the processor cannot write it
    fn serialize(&self, _stream: &mut dyn Write, _resource: &Resource, _args: &ContentArgs) -> bool {
        false
    }

    /// Value handed out for a cached resource
    fn duplicate(&self, cached: &Resource, _args: &ContentArgs) -> Resource {
        Arc::clone(cached)
    }

    /// Called once when a cache entry is dropped
    fn free(&self, _cached: &Resource) {}
}

/// Key for [`ContentManager::find`]
#[derive(Clone)]
pub enum Lookup<'a> {
    /// Entry loaded from a path
    Path(&'a Path),
    /// Entry holding this exact resource
    Resource(&'a Resource),
}

/// Snapshot of a cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    /// Processor that produced the resource
    pub processor: String,
    /// Source path
    pub path: PathBuf,
    /// Owner count
    pub owners: usize,
}

/// Requested `(offset, length)`; `None` length reads to the end of the file
type ByteRange = (u64, Option<u64>);

const WHOLE_FILE: ByteRange = (0, None);

struct Cached {
    resource: Resource,
    range: ByteRange,
    owners: usize,
}

/// Processor registry and resource cache
#[derive(Default)]
pub struct ContentManager {
    processors: RwLock<Vec<Arc<dyn Processor>>>,
    cache: Mutex<HashMap<(String, PathBuf), Cached>>,
}

impl ContentManager {
    /// Create a manager without processors
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager with the built-in processors registered
    pub fn with_defaults() -> Self {
        let manager = Self::new();
        manager.register(Arc::new(ShaderSourceProcessor));
        manager
    }

    /// Register a processor; false when one with the same name exists
    pub fn register(&self, processor: Arc<dyn Processor>) -> bool {
        let mut processors = self.processors.write();
        if processors.iter().any(|p| p.name() == processor.name()) {
            log::warn!("Processor '{}' already registered", processor.name());
            return false;
        }
        log::debug!("Registered content processor '{}'", processor.name());
        processors.push(processor);
        true
    }

    /// Processor by name
    pub fn processor(&self, name: &str) -> Option<Arc<dyn Processor>> {
        self.processors.read().iter().find(|p| p.name() == name).cloned()
    }

    fn processor_for(&self, path: &Path) -> Result<Arc<dyn Processor>, ContentError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        self.processors
            .read()
            .iter()
            .find(|p| p.extensions().iter().any(|e| e.eq_ignore_ascii_case(extension)))
            .cloned()
            .ok_or_else(|| ContentError::NoProcessor(path.display().to_string()))
    }

    /// Load a whole file
    pub fn load<T: Any + Send + Sync>(
        &self,
        path: impl AsRef<Path>,
        args: &ContentArgs,
    ) -> Result<Arc<T>, ContentError> {
        self.load_range(path, 0, None, args)
    }

    /// Load `length` bytes (the rest of the file when `None`) starting at `offset`
    pub fn load_range<T: Any + Send + Sync>(
        &self,
        path: impl AsRef<Path>,
        offset: u64,
        length: Option<u64>,
        args: &ContentArgs,
    ) -> Result<Arc<T>, ContentError> {
        let path = path.as_ref();
        let processor = self.processor_for(path)?;
        let key = (processor.name().to_string(), path.to_path_buf());
        let range = (offset, length);

        if let Some(cached) = self.cache.lock().get_mut(&key) {
            if cached.range != range {
                return Err(ContentError::RangeMismatch(path.display().to_string()));
            }
            if !cached.resource.is::<T>() {
                return Err(ContentError::TypeMismatch(path.display().to_string()));
            }
            cached.owners += 1;
            let duplicate = processor.duplicate(&cached.resource, args);
            return downcast(duplicate, path);
        }

        let mut file = File::open(path)?;
        let length = match length {
            Some(length) => length,
            None => file.metadata()?.len().saturating_sub(offset),
        };
        file.seek(SeekFrom::Start(offset))?;
        let mut stream = BufReader::new(file).take(length);

        let resource = processor
            .deserialize(&mut stream, length, offset, args)
            .ok_or_else(|| ContentError::Deserialize(path.display().to_string()))?;
        if !resource.is::<T>() {
            processor.free(&resource);
            return Err(ContentError::TypeMismatch(path.display().to_string()));
        }

        let mut cache = self.cache.lock();
        let resource = match cache.get_mut(&key) {
            Some(cached) if cached.range != range => {
                processor.free(&resource);
                return Err(ContentError::RangeMismatch(path.display().to_string()));
            }
            // Loaded concurrently by another thread; keep the first copy
            Some(cached) => {
                processor.free(&resource);
                cached.owners += 1;
                processor.duplicate(&cached.resource, args)
            }
            None => {
                cache.insert(
                    key,
                    Cached {
                        resource: Arc::clone(&resource),
                        range,
                        owners: 1,
                    },
                );
                resource
            }
        };
        drop(cache);

        log::debug!("Loaded '{}' with processor '{}'", path.display(), processor.name());
        downcast(resource, path)
    }

    /// Write a resource with the processor chosen by extension
    pub fn save<T: Any + Send + Sync>(
        &self,
        path: impl AsRef<Path>,
        value: &Arc<T>,
        args: &ContentArgs,
    ) -> Result<(), ContentError> {
        let path = path.as_ref();
        let processor = self.processor_for(path)?;
        let resource: Resource = Arc::clone(value) as Resource;

        let mut stream = BufWriter::new(File::create(path)?);
        if !processor.serialize(&mut stream, &resource, args) {
            return Err(ContentError::Serialize(path.display().to_string()));
        }
        stream.flush()?;
        Ok(())
    }

    /// Insert an externally created resource; false when the processor is
    /// unknown or the path is already cached
    pub fn cache(&self, processor: &str, path: impl AsRef<Path>, resource: Resource) -> bool {
        if self.processor(processor).is_none() {
            log::warn!("Cannot cache under unknown processor '{processor}'");
            return false;
        }
        let key = (processor.to_string(), path.as_ref().to_path_buf());
        let mut cache = self.cache.lock();
        if cache.contains_key(&key) {
            return false;
        }
        cache.insert(
            key,
            Cached {
                resource,
                range: WHOLE_FILE,
                owners: 1,
            },
        );
        true
    }

    /// Find a cache entry of `processor` by path or by resource identity
    pub fn find(&self, processor: &str, lookup: Lookup<'_>) -> Option<ContentEntry> {
        let cache = self.cache.lock();
        cache
            .iter()
            .filter(|((name, _), _)| name == processor)
            .find(|((_, path), cached)| match &lookup {
                Lookup::Path(wanted) => path == wanted,
                Lookup::Resource(resource) => Arc::ptr_eq(&cached.resource, resource),
            })
            .map(|((name, path), cached)| ContentEntry {
                processor: name.clone(),
                path: path.clone(),
                owners: cached.owners,
            })
    }

    /// Drop one owner of a loaded path; the entry is freed at zero.
    /// Returns false when the path is not cached.
    pub fn release(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let Ok(processor) = self.processor_for(path) else {
            return false;
        };
        let key = (processor.name().to_string(), path.to_path_buf());

        let freed = {
            let mut cache = self.cache.lock();
            let Some(cached) = cache.get_mut(&key) else {
                log::warn!("Release of uncached content '{}'", path.display());
                return false;
            };
            cached.owners -= 1;
            if cached.owners > 0 {
                return true;
            }
            cache.remove(&key)
        };

        if let Some(cached) = freed {
            processor.free(&cached.resource);
            log::debug!("Freed content '{}'", path.display());
        }
        true
    }

    /// Cached entry count
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

fn downcast<T: Any + Send + Sync>(resource: Resource, path: &Path) -> Result<Arc<T>, ContentError> {
    resource
        .downcast::<T>()
        .map_err(|_| ContentError::TypeMismatch(path.display().to_string()))
}

impl std::fmt::Debug for ContentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let processors: Vec<String> = self.processors.read().iter().map(|p| p.name().to_string()).collect();
        f.debug_struct("ContentManager")
            .field("processors", &processors)
            .field("cached", &self.len())
            .finish()
    }
}

/// Loads shader program text as [`ShaderSource`]
///
/// The `label` argument names the program; the file stem is used otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaderSourceProcessor;

impl Processor for ShaderSourceProcessor {
    fn name(&self) -> &str {
        "shader_source"
    }

    fn extensions(&self) -> &[&str] {
        &["glsl", "hlsl", "wgsl", "shader"]
    }

    fn deserialize(
        &self,
        stream: &mut dyn Read,
        length: u64,
        _offset: u64,
        args: &ContentArgs,
    ) -> Option<Resource> {
        let mut code = String::with_capacity(usize::try_from(length).unwrap_or_default());
        if let Err(e) = stream.read_to_string(&mut code) {
            log::error!("Shader source is not UTF-8 text: {e}");
            return None;
        }
        let label = args.get("label").cloned().unwrap_or_else(|| "shader".to_string());
        Some(Arc::new(ShaderSource::new(label, code)))
    }

    fn serialize(&self, stream: &mut dyn Write, resource: &Resource, _args: &ContentArgs) -> bool {
        let Some(source) = resource.downcast_ref::<ShaderSource>() else {
            return false;
        };
        stream.write_all(source.code.as_bytes()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_is_cached_and_owner_counted() {
        let path = temp_file("scene_engine_content_cached.glsl", "void main() {}");
        let content = ContentManager::with_defaults();

        let first = content.load::<ShaderSource>(&path, &ContentArgs::new()).unwrap();
        let second = content.load::<ShaderSource>(&path, &ContentArgs::new()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.code, "void main() {}");

        let entry = content.find("shader_source", Lookup::Path(&path)).unwrap();
        assert_eq!(entry.owners, 2);
        let resource: Resource = first.clone();
        assert_eq!(content.find("shader_source", Lookup::Resource(&resource)), Some(entry));

        assert!(content.release(&path));
        assert!(content.release(&path));
        assert!(content.is_empty());
        assert!(!content.release(&path));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_range_reads_a_slice() {
        let path = temp_file("scene_engine_content_range.shader", "HEADERbody");
        let content = ContentManager::with_defaults();

        let source = content
            .load_range::<ShaderSource>(&path, 6, Some(4), &ContentArgs::new())
            .unwrap();
        assert_eq!(source.code, "body");

        // The path stays bound to the slice it was first loaded from
        assert!(matches!(
            content.load::<ShaderSource>(&path, &ContentArgs::new()),
            Err(ContentError::RangeMismatch(_))
        ));
        let again = content
            .load_range::<ShaderSource>(&path, 6, Some(4), &ContentArgs::new())
            .unwrap();
        assert!(Arc::ptr_eq(&source, &again));
        assert_eq!(content.find("shader_source", Lookup::Path(&path)).map(|e| e.owners), Some(2));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_errors() {
        let content = ContentManager::with_defaults();
        assert!(matches!(
            content.load::<ShaderSource>("mesh.obj", &ContentArgs::new()),
            Err(ContentError::NoProcessor(_))
        ));
        assert!(matches!(
            content.load::<ShaderSource>("missing_file.glsl", &ContentArgs::new()),
            Err(ContentError::Io(_))
        ));

        let path = temp_file("scene_engine_content_type.glsl", "void main() {}");
        assert!(matches!(
            content.load::<String>(&path, &ContentArgs::new()),
            Err(ContentError::TypeMismatch(_))
        ));
        assert!(content.is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_save_and_reload_with_label() {
        let path = std::env::temp_dir().join("scene_engine_content_save.wgsl");
        let content = ContentManager::with_defaults();
        let source = Arc::new(ShaderSource::new("sky", "fn main() {}"));
        content.save(&path, &source, &ContentArgs::new()).unwrap();

        let mut args = ContentArgs::new();
        args.insert("label".to_string(), "sky".to_string());
        let loaded = content.load::<ShaderSource>(&path, &args).unwrap();
        assert_eq!(*loaded, *source);

        assert!(matches!(
            content.save(&path, &Arc::new(5_u32), &ContentArgs::new()),
            Err(ContentError::Serialize(_))
        ));
        let _ = std::fs::remove_file(&path);
    }

    struct Counting {
        freed: Arc<AtomicUsize>,
    }

    impl Processor for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn extensions(&self) -> &[&str] {
            &["count"]
        }

        fn deserialize(&self, _: &mut dyn Read, length: u64, _: u64, _: &ContentArgs) -> Option<Resource> {
            Some(Arc::new(length))
        }

        fn free(&self, _cached: &Resource) {
            self.freed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_cache_external_resource_and_free() {
        let freed = Arc::new(AtomicUsize::new(0));
        let content = ContentManager::new();
        assert!(content.register(Arc::new(Counting { freed: Arc::clone(&freed) })));
        assert!(!content.register(Arc::new(Counting { freed: Arc::clone(&freed) })));

        assert!(content.cache("counting", "virtual.count", Arc::new(7_u64)));
        assert!(!content.cache("counting", "virtual.count", Arc::new(8_u64)));
        assert!(!content.cache("unknown", "virtual.count", Arc::new(8_u64)));

        let value = content.load::<u64>("virtual.count", &ContentArgs::new()).unwrap();
        assert_eq!(*value, 7);
        assert!(content.release("virtual.count"));
        assert_eq!(freed.load(Ordering::SeqCst), 0);
        assert!(content.release("virtual.count"));
        assert_eq!(freed.load(Ordering::SeqCst), 1);
    }
}
