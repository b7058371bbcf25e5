//! Per-request policy gate
//!
//! Combines the user's settings, the filter index and the tracking-parameter
//! rewriter into one verdict. Checks run in a fixed order; the first decisive
//! outcome wins:
//!
//! 1. filtering off, no blocked content types, nothing to rewrite: pass
//! 2. non-http(s) URLs and main-frame navigations only get rewritten
//! 3. a resource type the user disabled is cancelled
//! 4. requests from an exception domain only get rewritten
//! 5. list-based blocking, gated by the blocking level
//! 6. tracking-parameter rewrite
//!
//! Every cancellation is counted exactly once.

use crate::counter::BlockedRequestCounter;
use crate::index::FilterIndex;
use crate::matcher::{MatchContext, Matcher};
use crate::origin::is_third_party;
use crate::rewriter::ParamRewriter;
use crate::settings::{BlockingLevel, BlockingSettings};
use crate::types::{RequestDescriptor, Verdict};
use crate::url::is_http_url;

#[derive(Debug, Default)]
pub struct PolicyGate {
    rewriter: ParamRewriter,
    counter: BlockedRequestCounter,
}

impl PolicyGate {
    pub fn new(rewriter: ParamRewriter, counter: BlockedRequestCounter) -> Self {
        Self { rewriter, counter }
    }

    pub fn counter(&self) -> &BlockedRequestCounter {
        &self.counter
    }

    pub fn rewriter(&self) -> &ParamRewriter {
        &self.rewriter
    }

    /// Decide what happens to `request`. Never fails; the worst case is an
    /// unfiltered request.
    pub fn evaluate(
        &self,
        index: &FilterIndex,
        settings: &BlockingSettings,
        request: &RequestDescriptor<'_>,
    ) -> Verdict {
        let verdict = self.decide(index, settings, request);
        log::trace!(
            "{} {} from {:?} -> {:?}",
            request.resource_type,
            request.url,
            request.initiating_domain,
            verdict
        );
        verdict
    }

    fn decide(
        &self,
        index: &FilterIndex,
        settings: &BlockingSettings,
        request: &RequestDescriptor<'_>,
    ) -> Verdict {
        if settings.blocking_level == BlockingLevel::Off
            && settings.content_types.is_empty()
            && !request.url.contains('?')
        {
            return Verdict::Pass;
        }

        if is_http_url(request.url) && !request.is_main_frame {
            if settings.content_types.contains(&request.resource_type) {
                self.counter.record();
                return Verdict::Cancel;
            }

            let exempt = request
                .initiating_domain
                .is_some_and(|domain| settings.is_exception_domain(domain));

            if !exempt && self.list_blocks(index, settings.blocking_level, request) {
                self.counter.record();
                return Verdict::Cancel;
            }
        }

        match self.rewriter.strip_tracking_params(request.url) {
            std::borrow::Cow::Owned(rewritten) if rewritten != request.url => {
                Verdict::Redirect(rewritten)
            }
            _ => Verdict::Pass,
        }
    }

    fn list_blocks(
        &self,
        index: &FilterIndex,
        level: BlockingLevel,
        request: &RequestDescriptor<'_>,
    ) -> bool {
        if level == BlockingLevel::Off || index.is_empty() {
            return false;
        }

        // Unknown initiators and unclassifiable URLs stay filterable
        let third_party = match request.initiating_domain {
            Some(domain) => is_third_party(domain, request.url).unwrap_or_else(|err| {
                log::trace!("treating {} as third-party: {err}", request.url);
                true
            }),
            None => true,
        };

        if level == BlockingLevel::ThirdParty && !third_party {
            return false;
        }

        let ctx = MatchContext::with_party(
            request.url,
            request.initiating_domain,
            request.resource_type.element_type(),
            third_party,
        );
        Matcher::new(index).match_request(&ctx).blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_domain;
    use crate::index::IndexKey;
    use crate::rule::{FilterRule, RulePattern};
    use crate::types::{ResourceType, RuleAction};

    fn host_index(domains: &[&str]) -> FilterIndex {
        FilterIndex::new(domains.iter().map(|domain| {
            (
                FilterRule::new(RuleAction::Block, RulePattern::Host(domain.to_string())),
                IndexKey::Host(hash_domain(domain)),
            )
        }))
    }

    fn settings(json: &str) -> BlockingSettings {
        BlockingSettings::from_json(json).unwrap()
    }

    fn request<'a>(url: &'a str, ty: ResourceType, initiator: Option<&'a str>) -> RequestDescriptor<'a> {
        RequestDescriptor {
            url,
            resource_type: ty,
            initiating_domain: initiator,
            is_main_frame: ty == ResourceType::MainFrame,
        }
    }

    #[test]
    fn third_party_ad_is_cancelled() {
        let gate = PolicyGate::default();
        let index = host_index(&["ads.example.com"]);
        let verdict = gate.evaluate(
            &index,
            &settings(r#"{"blockingLevel":1}"#),
            &request("https://ads.example.com/banner.js", ResourceType::Script, Some("news.example.org")),
        );
        assert_eq!(verdict, Verdict::Cancel);
        assert_eq!(gate.counter().pending(), 1);
    }

    #[test]
    fn first_party_request_passes_at_third_party_level() {
        let gate = PolicyGate::default();
        let index = host_index(&["ads.example.com"]);
        let verdict = gate.evaluate(
            &index,
            &settings(r#"{"blockingLevel":1}"#),
            &request("https://ads.example.com/banner.js", ResourceType::Script, Some("ads.example.com")),
        );
        assert_eq!(verdict, Verdict::Pass);
        assert_eq!(gate.counter().pending(), 0);
    }

    #[test]
    fn third_party_level_never_blocks_same_domain() {
        let gate = PolicyGate::default();
        let index = host_index(&["example.com", "cdn.example.com", "com"]);
        let level = settings(r#"{"blockingLevel":1}"#);
        for url in [
            "https://example.com/a.js",
            "https://cdn.example.com/b.js",
            "https://www.example.com/c.js",
        ] {
            let verdict = gate.evaluate(&index, &level, &request(url, ResourceType::Script, Some("www.example.com")));
            assert_eq!(verdict, Verdict::Pass, "{url}");
        }
    }

    #[test]
    fn level_all_blocks_first_party_too() {
        let gate = PolicyGate::default();
        let index = host_index(&["ads.example.com"]);
        let verdict = gate.evaluate(
            &index,
            &settings(r#"{"blockingLevel":2}"#),
            &request("https://ads.example.com/banner.js", ResourceType::Script, Some("ads.example.com")),
        );
        assert_eq!(verdict, Verdict::Cancel);
    }

    #[test]
    fn unknown_initiator_is_filtered() {
        let gate = PolicyGate::default();
        let index = host_index(&["ads.example.com"]);
        let verdict = gate.evaluate(
            &index,
            &settings(r#"{"blockingLevel":1}"#),
            &request("https://ads.example.com/banner.js", ResourceType::Image, None),
        );
        assert_eq!(verdict, Verdict::Cancel);
    }

    #[test]
    fn content_type_block_applies_at_level_off() {
        let gate = PolicyGate::default();
        let index = FilterIndex::empty();
        let off = settings(r#"{"blockingLevel":0,"contentTypes":["image"]}"#);

        let verdict = gate.evaluate(&index, &off, &request("https://a.com/x.png", ResourceType::Image, Some("a.com")));
        assert_eq!(verdict, Verdict::Cancel);
        assert_eq!(gate.counter().pending(), 1);

        let verdict = gate.evaluate(&index, &off, &request("https://a.com/x.js", ResourceType::Script, Some("a.com")));
        assert_eq!(verdict, Verdict::Pass);
    }

    #[test]
    fn exception_domain_skips_lists_but_still_rewrites() {
        let gate = PolicyGate::default();
        let index = host_index(&["tracker.net"]);
        let exempt = settings(r#"{"blockingLevel":2,"exceptionDomains":["www.news.com"]}"#);

        let verdict = gate.evaluate(
            &index,
            &exempt,
            &request("https://tracker.net/p?gclid=1&x=2", ResourceType::Xhr, Some("news.com")),
        );
        assert_eq!(verdict, Verdict::Redirect("https://tracker.net/p?x=2".into()));

        let verdict = gate.evaluate(
            &index,
            &exempt,
            &request("https://tracker.net/p", ResourceType::Xhr, Some("other.com")),
        );
        assert_eq!(verdict, Verdict::Cancel);
    }

    #[test]
    fn exception_domains_do_not_override_content_types() {
        let gate = PolicyGate::default();
        let blocked = settings(r#"{"contentTypes":["script"],"exceptionDomains":["news.com"]}"#);
        let verdict = gate.evaluate(
            &FilterIndex::empty(),
            &blocked,
            &request("https://cdn.net/a.js", ResourceType::Script, Some("news.com")),
        );
        assert_eq!(verdict, Verdict::Cancel);
    }

    #[test]
    fn main_frame_is_never_blocked_but_is_rewritten() {
        let gate = PolicyGate::default();
        let index = host_index(&["www.amazon.com"]);
        let all = settings(r#"{"blockingLevel":2,"contentTypes":["mainFrame"]}"#);
        let verdict = gate.evaluate(
            &index,
            &all,
            &request("https://www.amazon.com/product?pd_rd_r=abc&id=5", ResourceType::MainFrame, None),
        );
        assert_eq!(verdict, Verdict::Redirect("https://www.amazon.com/product?id=5".into()));
        assert_eq!(gate.counter().pending(), 0);
    }

    #[test]
    fn non_http_urls_skip_blocking() {
        let gate = PolicyGate::default();
        let all = settings(r#"{"blockingLevel":2,"contentTypes":["image"]}"#);
        let verdict = gate.evaluate(
            &FilterIndex::empty(),
            &all,
            &request("data:image/png;base64,AAAA", ResourceType::Image, Some("a.com")),
        );
        assert_eq!(verdict, Verdict::Pass);
    }

    #[test]
    fn filtering_off_fast_path_still_rewrites_queries() {
        let gate = PolicyGate::default();
        let index = host_index(&["tracker.net"]);
        let off = settings(r#"{"blockingLevel":0}"#);

        assert_eq!(
            gate.evaluate(&index, &off, &request("https://tracker.net/t.js", ResourceType::Script, None)),
            Verdict::Pass
        );
        assert_eq!(
            gate.evaluate(&index, &off, &request("https://tracker.net/t.js?fbclid=1", ResourceType::Script, None)),
            Verdict::Redirect("https://tracker.net/t.js".into())
        );
    }

    #[test]
    fn malformed_request_url_is_still_filtered() {
        let gate = PolicyGate::default();
        let index = host_index(&["ads.example.com"]);
        // The classifier cannot parse this; the request counts as third-party
        let verdict = gate.evaluate(
            &index,
            &settings(r#"{"blockingLevel":1}"#),
            &request("http://ads.example.com:99999/x.js", ResourceType::Script, Some("ads.example.com")),
        );
        assert_eq!(verdict, Verdict::Cancel);
    }
}
