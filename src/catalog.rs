//! Feature catalog construction.
//!
//! The catalog is the cross product of a fixed archetype table with
//! [`AudienceTag::ALL`]. Identities (ids, names, categories, evidence) are
//! static; only the simulated signal values are drawn from the supplied
//! random source, so two builds agree on everything except the numbers.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::models::{AudienceTag, FeatureInstance, Quantity, Signals, Trend};

const PSYCHOGRAPHIC: &str = "Psychographic (심리/라이프스타일)";
const PURCHASE: &str = "Behavioral - Purchase (소비 행동)";
const DIGITAL: &str = "Behavioral - Digital (디지털 행동)";
const FINANCE: &str = "Finance & Risk (금융/리스크)";
const JOURNEY: &str = "Customer Journey (고객 여정)";

/// Immutable definition of a feature family.
#[derive(Debug, Clone, Copy)]
pub struct FeatureArchetype {
    pub category: &'static str,
    pub name: &'static str,
    pub count_unit: &'static str,
    pub time_unit: &'static str,
    pub evidence: &'static str,
}

const fn archetype(
    category: &'static str,
    name: &'static str,
    count_unit: &'static str,
    time_unit: &'static str,
    evidence: &'static str,
) -> FeatureArchetype {
    FeatureArchetype {
        category,
        name,
        count_unit,
        time_unit,
        evidence,
    }
}

pub const ARCHETYPES: [FeatureArchetype; 15] = [
    archetype(PSYCHOGRAPHIC, "얼리어답터 지수", "회", "분", "GeekNews/Bloter IT 뉴스 구독"),
    archetype(PSYCHOGRAPHIC, "해외 트렌드 민감도", "회", "분", "Reddit/Twitch 해외 커뮤니티 접속"),
    archetype(PSYCHOGRAPHIC, "가치 소비 성향", "건", "분", "와디즈/텀블벅 펀딩 참여"),
    archetype(PSYCHOGRAPHIC, "삼성 브랜드 선호도", "회", "회", "삼성닷컴/삼성멤버스 활동 이력"),
    archetype(PSYCHOGRAPHIC, "애플 브랜드 충성도", "회", "회", "애플스토어/Apple 전용 서비스 결제"),
    archetype(PURCHASE, "식의주 고관여 소비", "건", "분", "마켓컬리 샛별배송 및 무신사 구매"),
    archetype(PURCHASE, "커피 하이엔드 취향", "회", "회", "스타벅스 리저브/블루보틀 결제"),
    archetype(PURCHASE, "배달 서비스 의존도", "회", "분", "배달의민족/쿠팡이츠 고빈도 주문"),
    archetype(DIGITAL, "커뮤니티 헤비 유저", "회", "분/일", "에펨코리아/클리앙 체류"),
    archetype(DIGITAL, "중고거래 액티브 레이팅", "건", "회", "당근마켓 매너온도 및 거래"),
    archetype(DIGITAL, "숏폼 콘텐츠 소비력", "회", "분/일", "틱톡/유튜브 쇼츠 시청"),
    archetype(FINANCE, "자산 성숙도", "회 접속", "분", "토스/카카오뱅크 자산 연동"),
    archetype(FINANCE, "투자 공격성", "회 거래", "분", "키움증권/미래에셋증권 등 주요 증권사 사이트 접속"),
    archetype(JOURNEY, "이탈 조짐 고위험군", "회", "일", "최근 한 달간 앱 미접속"),
    archetype(JOURNEY, "브랜드 옹호자(NPS)", "회", "분", "자발적 상품 후기 작성"),
];

/// Inclusive ranges for the simulated signals.
const COUNT_RANGE: (u32, u32) = (10, 150);
const TIME_RANGE: (u32, u32) = (20, 300);
const RECENCY_RANGE: (u32, u32) = (1, 14);

/// Number of instances every build produces.
pub fn catalog_size() -> usize {
    ARCHETYPES.len() * AudienceTag::ALL.len()
}

/// Build the catalog with the thread-local random source.
pub fn build_catalog() -> Vec<FeatureInstance> {
    build_catalog_with(&mut rand::thread_rng())
}

/// Build the catalog with the configured seed, or the thread RNG if unset.
pub fn build_catalog_for(config: &Config) -> Vec<FeatureInstance> {
    match config.catalog.seed {
        Some(seed) => build_catalog_with(&mut StdRng::seed_from_u64(seed)),
        None => build_catalog(),
    }
}

/// Build the catalog drawing signal values from `rng`.
pub fn build_catalog_with<R: Rng + ?Sized>(rng: &mut R) -> Vec<FeatureInstance> {
    let tag_count = AudienceTag::ALL.len();
    let mut features = Vec::with_capacity(catalog_size());

    for (archetype_index, arch) in ARCHETYPES.iter().enumerate() {
        for (tag_index, tag) in AudienceTag::ALL.iter().enumerate() {
            features.push(FeatureInstance {
                id: archetype_index * tag_count + tag_index,
                name: format!("{} ({})", arch.name, tag.label()),
                archetype: arch.name.to_string(),
                tag: *tag,
                category: arch.category.to_string(),
                evidence: arch.evidence.to_string(),
                signals: draw_signals(rng, arch),
            });
        }
    }

    tracing::debug!(count = features.len(), "feature catalog built");
    features
}

fn draw_signals<R: Rng + ?Sized>(rng: &mut R, arch: &FeatureArchetype) -> Signals {
    let count = rng.gen_range(COUNT_RANGE.0..=COUNT_RANGE.1);
    let time = rng.gen_range(TIME_RANGE.0..=TIME_RANGE.1);
    let recency = rng.gen_range(RECENCY_RANGE.0..=RECENCY_RANGE.1);
    Signals {
        occurrences: Quantity::new(count, arch.count_unit),
        duration: Quantity::new(time, arch.time_unit),
        recency_days: recency,
        trend_weekly: draw_trend(rng),
        trend_monthly: draw_trend(rng),
    }
}

fn draw_trend<R: Rng + ?Sized>(rng: &mut R) -> Trend {
    Trend::ALL[rng.gen_range(0..Trend::ALL.len())]
}

/// Print the catalog as a table (`tgt catalog`).
pub fn run_catalog(config: &Config, json: bool) -> Result<()> {
    let features = build_catalog_for(config);

    if json {
        println!("{}", serde_json::to_string_pretty(&features)?);
        return Ok(());
    }

    println!("{:<4} {:<36} {:<36} EVIDENCE", "ID", "NAME", "CATEGORY");
    for f in &features {
        println!("{:<4} {:<36} {:<36} {}", f.id, f.name, f.category, f.evidence);
    }
    println!();
    println!(
        "{} features ({} archetypes x {} audience tags)",
        features.len(),
        ARCHETYPES.len(),
        AudienceTag::ALL.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_size_and_unique_ids() {
        let features = build_catalog();
        assert_eq!(features.len(), 75);
        assert_eq!(features.len(), catalog_size());
        let ids: HashSet<usize> = features.iter().map(|f| f.id).collect();
        assert_eq!(ids.len(), features.len());
    }

    #[test]
    fn test_id_formula() {
        let features = build_catalog();
        for f in &features {
            let arch_idx = ARCHETYPES.iter().position(|a| a.name == f.archetype).unwrap();
            let tag_idx = AudienceTag::ALL.iter().position(|t| *t == f.tag).unwrap();
            assert_eq!(f.id, arch_idx * AudienceTag::ALL.len() + tag_idx);
        }
    }

    #[test]
    fn test_rebuild_keeps_identities() {
        let a = build_catalog();
        let b = build_catalog();
        let ident = |f: &FeatureInstance| (f.id, f.archetype.clone(), f.tag);
        let a_ids: Vec<_> = a.iter().map(ident).collect();
        let b_ids: Vec<_> = b.iter().map(ident).collect();
        assert_eq!(a_ids, b_ids);
    }

    #[test]
    fn test_seeded_build_is_reproducible() {
        let a = build_catalog_with(&mut StdRng::seed_from_u64(7));
        let b = build_catalog_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_signals_within_bounds() {
        let features = build_catalog_with(&mut StdRng::seed_from_u64(42));
        for f in &features {
            let s = &f.signals;
            assert!((10..=150).contains(&s.occurrences.value));
            assert!((20..=300).contains(&s.duration.value));
            assert!((1..=14).contains(&s.recency_days));
        }
    }

    #[test]
    fn test_display_name_includes_tag() {
        let features = build_catalog();
        assert_eq!(features[0].name, "얼리어답터 지수 (서울권)");
        assert_eq!(features[6].name, "해외 트렌드 민감도 (MZ세대)");
    }

    #[test]
    fn test_five_categories() {
        let cats: HashSet<&str> = ARCHETYPES.iter().map(|a| a.category).collect();
        assert_eq!(cats.len(), 5);
    }
}
