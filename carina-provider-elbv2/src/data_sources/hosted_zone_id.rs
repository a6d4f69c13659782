//! elbv2.hosted_zone_id data source
//!
//! Route 53 hosted zone IDs of load balancer DNS names, per region. No API call is made.

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{ResourceId, State, Value};

use crate::provider::Elbv2Provider;
use crate::utils::{Attrs, get_str};

/// (region, application, network)
const ZONES: &[(&str, &str, &str)] = &[
    ("af-south-1", "Z268VQBMOI5EKX", "Z203XCE67M25HM"),
    ("ap-east-1", "Z3DQVH9N71FHZ0", "Z12Y7K3UBGUAD1"),
    ("ap-northeast-1", "Z14GRHDCWA56QT", "Z31USIVHYNEOWT"),
    ("ap-northeast-2", "ZWKZPGTI48KDX", "ZIBE1TIR4HY56"),
    ("ap-northeast-3", "Z5LXEXXYW11ES", "Z1GWIQ4HH19I5X"),
    ("ap-south-1", "ZP97RAFLXTNZK", "ZVDDRBQ08TROA"),
    ("ap-southeast-1", "Z1LMS91P8CMLE5", "ZKVM4W9LS7TM"),
    ("ap-southeast-2", "Z1GM3OXH4ZPM65", "ZCT6FZBF4DROD"),
    ("ca-central-1", "ZQSVJUPU6J1EY", "Z2EPGBW3API2WT"),
    ("eu-central-1", "Z215JYRZR1TBD5", "Z3F0SRJ5LGBH90"),
    ("eu-north-1", "Z23TAZ7KBPWL5I", "Z1UDT6IFJ4EJM"),
    ("eu-south-1", "Z3ULH7SSC9OV64", "Z23146JA1KNAFP"),
    ("eu-west-1", "Z32O12XQLNTSW2", "Z2IFOLAFXWLO4F"),
    ("eu-west-2", "ZHURV8PSTC4K8", "ZD4D7Y8KGAS4G"),
    ("eu-west-3", "Z3Q77PNBQS71R4", "Z1CMS0P5QUZ6D5"),
    ("me-south-1", "ZS929ML54UICD", "Z3QSRYVP46NYYV"),
    ("sa-east-1", "Z2P70J7HTTTPLU", "ZTK26PT1VY4CU"),
    ("us-east-1", "Z35SXDOTRQ7X7K", "Z26RNL4JYFTOTI"),
    ("us-east-2", "Z3AADJGX6KTTL2", "ZLMOA37VPKANP"),
    ("us-gov-east-1", "Z166TLBEWOO7G0", "Z1ZSMQQ6Q24QQ8"),
    ("us-gov-west-1", "Z33AYJ8TM3BH4J", "ZMG1MZ2THAWF1"),
    ("us-west-1", "Z368ELLRRE2KJ0", "Z24FKFUX50B4VW"),
    ("us-west-2", "Z1H1FL5HABSF5", "Z18D5FSROUN65G"),
];

pub fn hosted_zone_id(region: &str, load_balancer_type: &str) -> Option<&'static str> {
    let (_, application, network) = ZONES.iter().find(|(r, _, _)| *r == region)?;
    match load_balancer_type {
        "application" => Some(application),
        "network" => Some(network),
        _ => None,
    }
}

pub fn read(provider: &Elbv2Provider, id: &ResourceId, attrs: &Attrs) -> ProviderResult<State> {
    let region = get_str(attrs, "region").unwrap_or(provider.region());
    let load_balancer_type = get_str(attrs, "load_balancer_type").unwrap_or("application");

    let zone_id = hosted_zone_id(region, load_balancer_type).ok_or_else(|| {
        ProviderError::new(format!(
            "no hosted zone ID known for {} load balancers in {}",
            load_balancer_type, region
        ))
        .for_resource(id.clone())
    })?;

    let mut state = Attrs::new();
    state.insert("id".to_string(), Value::from(zone_id));
    state.insert("region".to_string(), Value::from(region));
    state.insert("load_balancer_type".to_string(), Value::from(load_balancer_type));
    Ok(State::existing(id.clone(), state).with_identifier(zone_id))
}
