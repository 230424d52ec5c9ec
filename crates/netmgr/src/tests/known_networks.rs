use crate::known_networks::{
    KnownNetworks, KnownNetworksError, MemoryKnownNetworks, MAX_KNOWN_NETWORKS,
};
use crate::types::Credentials;

fn ssids(networks: &MemoryKnownNetworks) -> Vec<String> {
    networks
        .snapshot()
        .iter()
        .map(|entry| entry.ssid().to_string())
        .collect()
}

#[test]
fn newest_entry_is_first() {
    let mut networks = MemoryKnownNetworks::new();
    networks.add(&Credentials::new("a", "1")).unwrap();
    networks.add(&Credentials::new("b", "2")).unwrap();

    assert_eq!(ssids(&networks), ["b", "a"]);
    assert_eq!(networks.get(0).unwrap(), Credentials::new("b", "2"));
}

#[test]
fn re_adding_promotes_without_duplicating() {
    let mut networks = MemoryKnownNetworks::new();
    networks.add(&Credentials::new("a", "1")).unwrap();
    networks.add(&Credentials::new("b", "2")).unwrap();
    networks.add(&Credentials::new("a", "new")).unwrap();

    assert_eq!(ssids(&networks), ["a", "b"]);
    assert_eq!(networks.get(0).unwrap().password(), "new");
}

#[test]
fn full_list_forgets_least_recent() {
    let mut networks = MemoryKnownNetworks::new();
    for i in 0..MAX_KNOWN_NETWORKS {
        networks.add(&Credentials::new(&format!("net{i}"), "pw")).unwrap();
    }
    networks.add(&Credentials::new("fresh", "pw")).unwrap();

    assert_eq!(networks.len(), MAX_KNOWN_NETWORKS);
    assert_eq!(networks.get(0).unwrap().ssid(), "fresh");
    assert!(!ssids(&networks).contains(&"net0".to_string()));
    assert!(ssids(&networks).contains(&"net1".to_string()));
}

#[test]
fn remove_closes_the_gap() {
    let mut networks = MemoryKnownNetworks::with_entries([
        Credentials::new("a", "1"),
        Credentials::new("b", "2"),
        Credentials::new("c", "3"),
    ]);
    networks.remove("b").unwrap();

    assert_eq!(ssids(&networks), ["a", "c"]);
    assert_eq!(
        networks.remove("b"),
        Err(KnownNetworksError::NotFound("b".into()))
    );
}

#[test]
fn out_of_range_index_is_an_error() {
    let networks = MemoryKnownNetworks::new();
    assert!(networks.is_empty());
    assert_eq!(networks.get(0), Err(KnownNetworksError::InvalidIndex(0)));
}

#[test]
fn clones_share_entries() {
    let networks = MemoryKnownNetworks::new();
    let mut owned = networks.clone();
    owned.add(&Credentials::new("shared", "pw")).unwrap();
    assert_eq!(ssids(&networks), ["shared"]);
}
