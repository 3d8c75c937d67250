/// Tests for modular service registration
///
/// Modules group registrations; they can depend on each other's services
/// and report registration failures through `add_module`.

use callsite_di::{DiError, DiResult, Resolver, ServiceCollection, ServiceModule};
use std::sync::Arc;

// ===== Test Services =====

#[derive(Debug)]
struct StorageSettings {
    bucket: String,
    replicas: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            bucket: "primary".to_string(),
            replicas: 3,
        }
    }
}

#[derive(Debug)]
struct BlobStore {
    settings: Arc<StorageSettings>,
}

impl BlobStore {
    fn describe(&self) -> String {
        format!("{} x{}", self.settings.bucket, self.settings.replicas)
    }
}

trait UserRepository: Send + Sync {
    fn find(&self, id: u32) -> String;
}

struct BlobUserRepository {
    store: Arc<BlobStore>,
}

impl UserRepository for BlobUserRepository {
    fn find(&self, id: u32) -> String {
        format!("user {} in {}", id, self.store.describe())
    }
}

// ===== Modules =====

struct CoreModule;

impl ServiceModule for CoreModule {
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
        services.add_singleton(StorageSettings::default());
        services.add_singleton_factory::<BlobStore, _>(|r| {
            Ok(BlobStore {
                settings: r.get::<StorageSettings>()?,
            })
        });
        Ok(())
    }
}

struct UserModule;

impl ServiceModule for UserModule {
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
        services.add_scoped_trait_factory::<dyn UserRepository, _>(|r| {
            Ok(Arc::new(BlobUserRepository {
                store: r.get::<BlobStore>()?,
            }) as Arc<dyn UserRepository>)
        });
        Ok(())
    }
}

struct OverrideModule {
    replicas: u32,
}

impl ServiceModule for OverrideModule {
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
        services.add_singleton(StorageSettings {
            bucket: "archive".to_string(),
            replicas: self.replicas,
        });
        Ok(())
    }
}

struct FailingModule;

impl ServiceModule for FailingModule {
    fn register_services(self, _services: &mut ServiceCollection) -> DiResult<()> {
        Err(DiError::factory("FailingModule", "missing connection string"))
    }
}

// ===== Tests =====

#[test]
fn test_modules_compose() {
    let mut services = ServiceCollection::new();
    services.add_module(CoreModule).unwrap();
    services.add_module(UserModule).unwrap();

    let provider = services.build();
    let scope = provider.create_scope();
    let repo = scope.get_trait::<dyn UserRepository>().unwrap();
    assert_eq!(repo.find(7), "user 7 in primary x3");
}

#[test]
fn test_chained_module_registration() {
    let mut services = ServiceCollection::new();
    services
        .add_module(CoreModule)
        .and_then(|s| s.add_module(UserModule))
        .unwrap();
    assert_eq!(services.len(), 3);
}

#[test]
fn test_later_module_overrides_earlier_registration() {
    let mut services = ServiceCollection::new();
    services.add_module(CoreModule).unwrap();
    services.add_module(OverrideModule { replicas: 1 }).unwrap();

    let provider = services.build();
    let store = provider.get::<BlobStore>().unwrap();
    assert_eq!(store.describe(), "archive x1");
    assert_eq!(provider.get_all::<StorageSettings>().unwrap().len(), 2);
}

#[test]
fn test_module_failure_is_reported() {
    let mut services = ServiceCollection::new();
    services.add_module(CoreModule).unwrap();
    match services.add_module(FailingModule) {
        Err(error) => assert!(error.to_string().contains("missing connection string")),
        Ok(_) => panic!("module registration should fail"),
    }

    // Registrations made before the failure are kept
    assert_eq!(services.len(), 2);
}
