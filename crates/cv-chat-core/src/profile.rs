//! The biography the assistant answers from, and the canned starter questions.

use std::fs;
use std::path::Path;
use anyhow::{Context, Result};

pub const CV_CONTEXT: &str = r#"
You are a helpful AI assistant on Lars's personal website. Answer questions about Lars's CV.
Only answer questions related to Lars and his professional background. Keep answers concise.

--- Lars's CV ---

Name: Lars
Title: Full-Stack Software Engineer
Location: Germany
Email: lars@example.com
GitHub: github.com/Lars263506
LinkedIn: linkedin.com/in/lars

About:
Passionate full-stack software engineer with 5+ years of experience building scalable web applications.
I love turning complex problems into elegant solutions. When I'm not coding, I enjoy hiking and photography.

Experience:
- Senior Software Engineer at TechCorp GmbH (2022–Present)
  Led development of a microservices architecture serving 500K+ daily active users.
  Reduced API response times by 40% through caching strategies.
  Mentored 3 junior engineers.
  Tech: TypeScript, React, Node.js, PostgreSQL, Docker, Kubernetes, AWS

- Software Engineer at StartupXYZ (2020–2022)
  Built and shipped full-stack features for a B2B SaaS platform.
  Integrated third-party payment and analytics APIs.
  Tech: JavaScript, Vue.js, Python, Django, MySQL, Redis

- Junior Developer at WebAgency Berlin (2018–2020)
  Developed client websites and internal tools.
  Tech: HTML, CSS, JavaScript, PHP, WordPress

Education:
- B.Sc. Computer Science, Technical University of Berlin (2014–2018)
  Thesis: "Optimizing Graph Query Performance in Distributed Systems"

Skills:
  Languages: TypeScript, JavaScript, Python, SQL, HTML/CSS
  Frontend: React, Vue.js, Next.js, Tailwind CSS
  Backend: Node.js, Express, Django, REST APIs, GraphQL
  Databases: PostgreSQL, MySQL, MongoDB, Redis
  DevOps: Docker, Kubernetes, GitHub Actions, AWS, CI/CD
  Tools: Git, Jira, Figma, VS Code

Languages:
  German (native), English (fluent)

Certifications:
  AWS Certified Developer – Associate (2023)
"#;

/// Starter questions offered before the first message is sent
pub const SUGGESTIONS: [&str; 3] = [
    "What companies has Lars worked at?",
    "What are Lars's main skills?",
    "Where did Lars study?",
];

/// Read a replacement system prompt from disk. Blank files are rejected so
/// the assistant is never started without context.
pub fn load_context(path: &Path) -> Result<String> {
    let context = fs::read_to_string(path)
        .with_context(|| format!("Could not read context file {}", path.display()))?;

    if context.trim().is_empty() {
        anyhow::bail!("Context file {} is empty", path.display());
    }

    Ok(context)
}
