//! Tracker campaign URL construction.
//!
//! The final_url returned to the iOS app points at the downstream tracker,
//! which routes the user to the actual offer. The parameter set is the
//! contract: given the same inputs the same values are always emitted, for
//! both the Facebook and the AppsFlyer attribution source.

use url::Url;

use crate::errors::Result;
use crate::storage::{AppTenant, Click};

/// Unified parameter set for the tracker URL, covering both sources.
#[derive(Debug, Clone, Default)]
pub struct TrackerParams {
    /// clicks.click_id for Facebook, appsflyer_id for AppsFlyer.
    pub click_id: Option<String>,
    pub sub1: Option<String>,
    pub sub2: Option<String>,
    pub sub3: Option<String>,
    pub sub4: Option<String>,
    pub sub5: Option<String>,
    /// Device IDFV, echoed back by tracker postbacks.
    pub sub6: Option<String>,
    /// Campaign label for push segmentation; "organic" when unmatched.
    pub push_sub: Option<String>,
    pub os_user_key: String,
    pub fbclid: Option<String>,
    pub adset: Option<String>,
    pub media_source: Option<String>,
    pub campaign: Option<String>,
    pub bundle: Option<String>,
    pub app_version: Option<String>,
}

impl TrackerParams {
    /// Parameters for a Facebook-sourced attribution. `click` is None for
    /// organic installs, which still get a tracker URL keyed by os_user_key.
    pub fn from_click(
        click: Option<&Click>,
        os_user_key: &str,
        idfv: Option<&str>,
        app_version: Option<&str>,
    ) -> Self {
        TrackerParams {
            click_id: click.map(|c| c.click_id.clone()),
            sub1: click.and_then(|c| c.sub1.clone()),
            sub2: click.and_then(|c| c.sub2.clone()),
            sub3: click.and_then(|c| c.sub3.clone()),
            sub4: click.and_then(|c| c.sub4.clone()),
            sub5: click.and_then(|c| c.sub5.clone()),
            sub6: idfv.map(String::from),
            push_sub: Some(
                click
                    .and_then(|c| c.sub1.clone())
                    .unwrap_or_else(|| "organic".to_string()),
            ),
            os_user_key: os_user_key.to_string(),
            fbclid: click.and_then(|c| c.fbclid.clone()),
            adset: click.and_then(|c| c.adsetid.clone()),
            media_source: click
                .and_then(|c| c.fbclid.as_ref())
                .map(|_| "facebook".to_string()),
            campaign: click.and_then(|c| c.sub1.clone()),
            bundle: None,
            app_version: app_version.map(String::from),
        }
    }

    /// Parameters for an AppsFlyer conversion-data callback.
    #[allow(clippy::too_many_arguments)]
    pub fn from_appsflyer(
        appsflyer_id: &str,
        media_source: Option<&str>,
        campaign: Option<&str>,
        af_subs: [Option<&str>; 5],
        os_user_key: &str,
        idfv: Option<&str>,
        app_version: Option<&str>,
    ) -> Self {
        let [af_sub1, af_sub2, af_sub3, af_sub4, af_sub5] = af_subs;
        TrackerParams {
            click_id: Some(appsflyer_id.to_string()),
            sub1: af_sub1.map(String::from),
            sub2: af_sub2.map(String::from),
            sub3: af_sub3.map(String::from),
            sub4: af_sub4.map(String::from),
            sub5: af_sub5.map(String::from),
            sub6: idfv.map(String::from),
            push_sub: Some(af_sub1.unwrap_or("organic").to_string()),
            os_user_key: os_user_key.to_string(),
            fbclid: None,
            adset: None,
            media_source: media_source.map(String::from),
            campaign: campaign.map(String::from),
            bundle: None,
            app_version: app_version.map(String::from),
        }
    }
}

/// Serializes `params` onto the tenant's campaign URL (or `default_base`).
///
/// Pure given its inputs. Several fields are emitted twice under different
/// names because the tracker's campaign macros and its internal routing
/// read different parameters.
pub fn build_tracker_url(
    params: &TrackerParams,
    tenant: Option<&AppTenant>,
    default_base: &str,
) -> Result<String> {
    let base = tenant
        .and_then(|t| t.tracker_campaign_url.as_deref())
        .filter(|u| !u.is_empty())
        .unwrap_or(default_base);

    let mut url = Url::parse(base)?;
    {
        let mut query = url.query_pairs_mut();

        if let Some(app_name) = tenant.and_then(|t| t.app_name.as_deref()) {
            query.append_pair("app_name", app_name);
        }
        if let Some(click_id) = &params.click_id {
            query.append_pair("appsflyer_id", click_id);
        }
        query.append_pair("customer_user_id", &params.os_user_key);
        if let Some(media_source) = &params.media_source {
            query.append_pair("source", media_source);
        }
        let bundle = params
            .bundle
            .as_deref()
            .or_else(|| tenant.map(|t| t.bundle_id.as_str()));
        if let Some(bundle) = bundle {
            query.append_pair("bundle", bundle);
        }
        if let Some(campaign) = &params.campaign {
            query.append_pair("campaign", campaign);
        }
        if let Some(sub1) = &params.sub1 {
            query.append_pair("af_sub1", sub1);
        }
        if let Some(sub2) = &params.sub2 {
            query.append_pair("af_sub2", sub2);
        }
        if let Some(push_sub) = &params.push_sub {
            query.append_pair("push_sub", push_sub);
        }

        for (name, value) in [
            ("sub1", &params.sub1),
            ("sub2", &params.sub2),
            ("sub3", &params.sub3),
            ("sub4", &params.sub4),
            ("sub5", &params.sub5),
            ("sub6", &params.sub6),
        ] {
            if let Some(value) = value {
                query.append_pair(name, value);
            }
        }

        if let Some(click_id) = &params.click_id {
            query.append_pair("click_id", click_id);
            query.append_pair("external_id", click_id);
        }
        query.append_pair("os_user_key", &params.os_user_key);
        if let Some(push_sub) = &params.push_sub {
            query.append_pair("push", push_sub);
        }
        if let Some(fbclid) = &params.fbclid {
            query.append_pair("fbclid", fbclid);
        }
        if let Some(adset) = &params.adset {
            query.append_pair("adset", adset);
            query.append_pair("sub_id_18", adset);
        }
        if let Some(app_version) = &params.app_version {
            query.append_pair("app_version", app_version);
        }
    }

    Ok(url.to_string())
}
