/**
 * \brief 固定格式的前缀，原样嵌入岗位 JD 与简历。
 */
pub fn system_prefix(job_description: &str, resume_text: &str) -> String {
    format!(
        "任务：根据以下岗位JD和个人简历生成一条招聘平台打招呼语\n\n岗位JD：\n{job_description}\n\n个人简历：\n{resume_text}\n\n"
    )
}

/**
 * \brief 内置的生成要求。只作为提示词发给模型，本地不校验模型输出。
 */
pub fn default_instructions() -> &'static str {
    DEFAULT_INSTRUCTIONS
}

/**
 * \brief 拼接完整提示词；自定义要求为空白时退回内置要求。
 */
pub fn build_prompt(
    job_description: &str,
    resume_text: &str,
    custom_instructions: Option<&str>,
) -> String {
    let instructions = custom_instructions
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_INSTRUCTIONS);
    let mut prompt = system_prefix(job_description, resume_text);
    prompt.push_str(instructions);
    prompt
}

const DEFAULT_INSTRUCTIONS: &str = "要求：
1. 直接以\"您好，我\"开头，不需要自我介绍姓名
2. 重点突出与Golang开发相关的核心技能(如Gin、Beego等框架使用经验)，尤其是与安全开发相关的能力
3. 技术点不超过4个，优先选择与岗位JD中要求和加分项匹配的内容
4. 提及简历中确实具备的经验，不要虚构不存在的技能
5. 对于岗位JD中的加分项，优势，技术栈 如有相关经验应当在前半部分优先展示，占据前20个字的60%
6. 保持谦虚专业的语气，避免\"精通\"、\"拥有多年经验\"等自我评价
7. 不提及具体公司名称和项目名称
8. 结尾固定为：\"期待和您有关于岗位的深度沟通，方便的话发您我的附件简历。\"
9. 整体字数控制在100-150字之间

禁止：
1. 不要使用套话、空洞赞美或过于正式的表达
2. 不要使用分点列举的形式
3. 不要提及简历中没有的技能
4. 不要同时突出多种编程语言，以岗位需求为主
5. 不要有其他的语气助词

仅输出最终生成的打招呼语文本，不包含任何其他说明或解释。";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_instructions_used_when_absent() {
        let p = build_prompt("JD", "CV", None);
        assert!(p.starts_with("任务："));
        assert!(p.ends_with(default_instructions()));
    }

    #[test]
    fn test_custom_instructions_used_verbatim() {
        let custom = "只写一句话。\n  保留缩进";
        let p = build_prompt("JD", "CV", Some(custom));
        assert!(p.ends_with(custom));
        assert!(!p.contains("禁止："));
    }

    #[test]
    fn test_blank_custom_instructions_fall_back() {
        let p = build_prompt("JD", "CV", Some("   \n"));
        assert!(p.ends_with(default_instructions()));
    }

    #[test]
    fn test_inputs_embedded_verbatim_even_when_large() {
        let jd: String = "招聘 Rust 工程师，负责网关开发；\n".repeat(5_000);
        let resume: String = "五年后端经验 {braces} $dollar \\slash\n".repeat(5_000);
        let p = build_prompt(&jd, &resume, None);
        assert!(p.contains(&jd));
        assert!(p.contains(&resume));
        assert!(p.len() > jd.len() + resume.len());
    }

    #[test]
    fn test_blank_inputs_still_produce_prompt() {
        let p = build_prompt("", "", None);
        assert!(p.contains("岗位JD：\n\n"));
        assert!(p.contains("个人简历：\n\n"));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(
            build_prompt("a", "b", Some("c")),
            build_prompt("a", "b", Some("c"))
        );
    }
}
