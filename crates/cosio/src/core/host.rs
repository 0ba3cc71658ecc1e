const DEFAULT_SUFFIX: &str = ".myqcloud.com";
const BACKUP_SUFFIX: &str = ".tencentcos.cn";

/// Regions whose endpoint predates the `cos.<region>` naming.
const LEGACY_REGIONS: &[&str] = &["cn-east", "cn-north", "cn-south", "cn-southwest", "cn-south-2", "sg"];

/// `<bucket>[-<appid>].cos.<region>.myqcloud.com`
pub fn default_host(app_id: u64, region: &str, bucket: &str) -> String {
    let region = if LEGACY_REGIONS.contains(&region) || region.starts_with("cos.") {
        region.to_string()
    } else {
        format!("cos.{region}")
    };

    let suffix = format!("-{app_id}");
    if app_id == 0 || bucket.ends_with(&suffix) {
        format!("{bucket}.{region}{DEFAULT_SUFFIX}")
    } else {
        format!("{bucket}{suffix}.{region}{DEFAULT_SUFFIX}")
    }
}

/// Swap the default domain suffix for the backup one. Other hosts are returned unchanged.
pub fn backup_host(host: &str) -> String {
    match host.strip_suffix(DEFAULT_SUFFIX) {
        Some(stem) => format!("{stem}{BACKUP_SUFFIX}"),
        None => host.to_string(),
    }
}

pub fn is_default_domain(host: &str) -> bool { host.ends_with(DEFAULT_SUFFIX) }

/// Absolute request path for an object key: percent-encoded per segment, `/` kept.
pub fn object_path(key: &str) -> String {
    let key = key.strip_prefix('/').unwrap_or(key);
    let encoded = key.split('/').map(|segment| urlencoding::encode(segment)).collect::<Vec<_>>().join("/");
    format!("/{encoded}")
}

pub fn object_url(scheme: &str, host: &str, path: &str) -> String { format!("{scheme}://{host}{path}") }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_host_appends_app_id() {
        assert_eq!(
            default_host(1250000000, "ap-guangzhou", "photos"),
            "photos-1250000000.cos.ap-guangzhou.myqcloud.com"
        );
    }

    #[test]
    fn test_default_host_keeps_existing_app_id() {
        assert_eq!(
            default_host(1250000000, "ap-guangzhou", "photos-1250000000"),
            "photos-1250000000.cos.ap-guangzhou.myqcloud.com"
        );
        assert_eq!(default_host(0, "ap-beijing", "b-1"), "b-1.cos.ap-beijing.myqcloud.com");
    }

    #[test]
    fn test_default_host_legacy_regions() {
        assert_eq!(default_host(0, "cn-north", "b"), "b.cn-north.myqcloud.com");
        assert_eq!(default_host(0, "cos.ap-shanghai", "b"), "b.cos.ap-shanghai.myqcloud.com");
    }

    #[test]
    fn test_backup_host() {
        assert_eq!(
            backup_host("b-1.cos.ap-guangzhou.myqcloud.com"),
            "b-1.cos.ap-guangzhou.tencentcos.cn"
        );
        assert_eq!(backup_host("static.example.com"), "static.example.com");
        assert!(!is_default_domain(&backup_host("b.cos.ap-beijing.myqcloud.com")));
    }

    #[test]
    fn test_object_path_encoding() {
        assert_eq!(object_path("dir/sub dir/a+b.txt"), "/dir/sub%20dir/a%2Bb.txt");
        assert_eq!(object_path("/leading"), "/leading");
        assert_eq!(object_path("中文"), "/%E4%B8%AD%E6%96%87");
    }
}
