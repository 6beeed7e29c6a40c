//! Field-name synonym dictionary.
//!
//! Maps the many names a resume field shows up under (English, Chinese,
//! abbreviations) to one canonical name. Lookups are pure and case-insensitive.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Canonical name followed by its synonyms. A synonym appears under exactly one
/// canonical name and never equals another canonical name.
const TABLE: &[(&str, &[&str])] = &[
    // basic info
    ("name", &["姓名", "名字", "full_name", "candidate_name", "real_name"]),
    ("gender", &["性别", "sex"]),
    ("birth_date", &["birthday", "出生日期", "出生年月", "生日", "date_of_birth", "dob"]),
    ("age", &["年龄"]),
    (
        "phone",
        &[
            "mobile",
            "手机",
            "手机号",
            "手机号码",
            "电话",
            "联系电话",
            "telephone",
            "tel",
            "phone_number",
            "mobile_phone",
            "cellphone",
        ],
    ),
    ("email", &["邮箱", "电子邮箱", "邮件", "e-mail", "mail", "email_address"]),
    (
        "location",
        &["current_location", "现居地", "现居住地", "所在地", "居住地", "所在城市", "city", "address", "地址"],
    ),
    ("work_location", &["current_work_location", "工作地点", "工作地", "work_city"]),
    ("hometown", &["籍贯", "native_place", "户口所在地"]),
    ("marital_status", &["婚姻状况", "婚否"]),
    ("political_status", &["政治面貌"]),
    ("nationality", &["国籍"]),
    ("ethnicity", &["民族"]),
    ("website", &["website_url", "个人网站", "个人主页", "homepage", "blog", "博客"]),
    ("linkedin", &["linkedin_url", "领英"]),
    ("github", &["github_url"]),
    ("wechat", &["微信", "微信号", "wechat_id"]),
    ("expected_salary", &["期望薪资", "期望薪水", "salary_expectation", "desired_salary"]),
    ("current_salary", &["目前薪资", "当前薪资", "现薪资"]),
    ("years_of_experience", &["工作年限", "工作经验", "work_years", "experience_years"]),
    ("job_intention", &["求职意向", "期望职位", "target_position", "desired_position"]),
    ("summary", &["自我评价", "个人简介", "个人总结", "self_evaluation", "profile", "about_me"]),
    // work experience
    ("company", &["公司", "公司名称", "company_name", "employer", "单位", "工作单位"]),
    ("position", &["职位", "岗位", "职务", "job_title", "title"]),
    ("start_date", &["开始时间", "起始时间", "入职时间", "from", "start"]),
    ("end_date", &["结束时间", "离职时间", "to", "end"]),
    ("period", &["时间", "时间段", "起止时间", "duration", "date_range"]),
    ("responsibilities", &["工作职责", "职责", "工作内容", "duties", "job_description"]),
    ("achievements", &["工作业绩", "业绩", "成就", "主要成就", "accomplishments"]),
    ("team_size", &["团队规模", "管理人数"]),
    ("business_domain", &["业务领域", "行业", "industry"]),
    ("tech_stack", &["技术栈", "technology_stack"]),
    ("report_to", &["汇报对象", "直属上级", "reports_to"]),
    ("reason_for_leaving", &["离职原因", "leaving_reason"]),
    ("skills_used", &["使用技能", "所用技能"]),
    // education
    ("school", &["学校", "毕业院校", "院校", "university", "college"]),
    ("major", &["专业", "所学专业", "field_of_study", "specialization"]),
    ("degree", &["学位"]),
    ("education_level", &["学历", "degree_level", "最高学历"]),
    ("graduation_date", &["毕业时间", "毕业日期", "graduation_year"]),
    // projects
    ("project_name", &["项目名称", "项目名"]),
    ("description", &["描述", "项目描述", "project_description", "项目简介"]),
    ("role", &["角色", "担任角色", "项目角色", "project_role"]),
    ("outcome", &["项目成果", "成果", "project_outcome"]),
    // skills
    (
        "technical",
        &["专业技能", "技术能力", "技能", "technical_skills", "technical_ability", "hard_skills"],
    ),
    ("soft", &["软技能", "soft_skills", "综合能力"]),
    ("languages", &["语言能力", "外语", "language_ability", "language_skills"]),
];

struct Index {
    canonical: HashMap<String, &'static str>,
    reverse: HashMap<String, &'static str>,
}

fn index() -> &'static Index {
    static INDEX: OnceLock<Index> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut canonical = HashMap::new();
        let mut reverse = HashMap::new();
        for (name, synonyms) in TABLE {
            canonical.insert(name.to_lowercase(), *name);
            for s in *synonyms {
                reverse.insert(s.to_lowercase(), *name);
            }
        }
        Index { canonical, reverse }
    })
}

/// Canonical name for `candidate`: exact canonical match, then synonym
/// lookup, otherwise the input unchanged.
pub fn resolve(candidate: &str) -> String {
    let key = candidate.trim().to_lowercase();
    let idx = index();
    idx.canonical
        .get(&key)
        .or_else(|| idx.reverse.get(&key))
        .map(|name| name.to_string())
        .unwrap_or_else(|| candidate.to_string())
}

/// Synonyms registered for a canonical name.
pub fn synonyms_of(canonical: &str) -> &'static [&'static str] {
    TABLE
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, synonyms)| *synonyms)
        .unwrap_or(&[])
}

pub fn is_canonical(name: &str) -> bool {
    index().canonical.contains_key(&name.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_resolve_order() {
        assert_eq!(resolve("phone"), "phone");
        assert_eq!(resolve("Phone"), "phone");
        assert_eq!(resolve("手机"), "phone");
        assert_eq!(resolve("  Mobile "), "phone");
        assert_eq!(resolve("favourite_colour"), "favourite_colour");
    }

    #[test]
    fn test_table_has_no_ambiguous_synonyms() {
        let canonicals: HashSet<String> = TABLE.iter().map(|(n, _)| n.to_lowercase()).collect();
        assert_eq!(canonicals.len(), TABLE.len(), "duplicate canonical name");

        let mut seen = HashSet::new();
        for (name, synonyms) in TABLE {
            for s in *synonyms {
                let lowered = s.to_lowercase();
                assert!(!canonicals.contains(&lowered), "{s} is a canonical name");
                assert!(seen.insert(lowered), "{s} listed under more than one name ({name})");
            }
        }
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut inputs: Vec<String> = TABLE
            .iter()
            .flat_map(|(n, syns)| std::iter::once(*n).chain(syns.iter().copied()))
            .map(str::to_string)
            .collect();
        inputs.extend(["unknown_field", "ＡＢＣ", "", "  spaced  "].map(String::from));
        for x in inputs {
            let once = resolve(&x);
            assert_eq!(resolve(&once), once, "input {x:?}");
        }
    }

    #[test]
    fn test_synonyms_of() {
        assert!(synonyms_of("location").contains(&"current_location"));
        assert!(synonyms_of("nope").is_empty());
        assert!(is_canonical("Email"));
    }
}
